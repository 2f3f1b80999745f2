//! Seeded helpdesk shared by the end-to-end scenarios.
//!
//! ```text
//! group support  -> queue first-line   -> ticket first   (no owner)
//! group billing  -> queue invoices     -> ticket acme    (owner acme)
//!                                      -> ticket globex  (owner globex)
//!
//! alice  agent  rw on support
//! bob    agent  ro on support
//! carol  agent  no grants
//! root   admin  no grants
//! xena   customer of acme
//! yuri   customer of globex
//! ```

use deskgate::permissions::PermissionKind;

use super::app::TestApp;

#[allow(dead_code)]
pub struct World {
    pub alice: i64,
    pub bob: i64,
    pub carol: i64,
    pub root: i64,
    pub xena: i64,
    pub yuri: i64,
    pub support: i64,
    pub billing: i64,
    pub first_line: i64,
    pub invoices: i64,
    pub first_ticket: i64,
    pub acme_ticket: i64,
    pub globex_ticket: i64,
}

impl World {
    pub async fn seed(app: &TestApp) -> anyhow::Result<Self> {
        let dir = app.db.directory();
        let alice = dir.create_agent("alice", false).await?;
        let bob = dir.create_agent("bob", false).await?;
        let carol = dir.create_agent("carol", false).await?;
        let root = dir.create_agent("root", true).await?;

        dir.create_company("acme", "Acme Corp").await?;
        dir.create_company("globex", "Globex").await?;
        let xena = dir.create_customer("xena", Some("acme")).await?;
        let yuri = dir.create_customer("yuri", Some("globex")).await?;

        let support = dir.create_group("support").await?;
        let billing = dir.create_group("billing").await?;
        let first_line = dir.create_queue("first-line", support).await?;
        let invoices = dir.create_queue("invoices", billing).await?;

        let grants = app.db.grants();
        grants.grant_agent(alice, support, PermissionKind::Rw).await?;
        grants.grant_agent(bob, support, PermissionKind::Ro).await?;

        let tickets = app.db.tickets();
        let first_ticket = tickets.create(first_line, None, "Printer on fire", 3).await?.id;
        let acme_ticket = tickets
            .create(invoices, Some("acme"), "Invoice 1042 is wrong", 3)
            .await?
            .id;
        let globex_ticket = tickets
            .create(invoices, Some("globex"), "Refund request", 3)
            .await?
            .id;

        Ok(Self {
            alice,
            bob,
            carol,
            root,
            xena,
            yuri,
            support,
            billing,
            first_line,
            invoices,
            first_ticket,
            acme_ticket,
            globex_ticket,
        })
    }
}
