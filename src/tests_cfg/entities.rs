//! Entity fixtures covering every binding shape.
//!
//! Customer ─1:1─ Profile (inverse, eager, cascade)
//! Customer ─1:n─ Order (inverse through the `customer` relation, lazy)
//! Order ─n:1─ Customer (owning, eager)
//! Order ─1:n─ OrderLine (cascade + orphan removal)
//! OrderLine ─1:n─ LineNote (cascade + orphan removal)
//! Order ─n:m─ Tag (bridge `order_tags`, cascade)

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

use crate::descriptor::{Entity, EntityDef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderStatus {
    #[default]
    New,
    Paid,
    Shipped,
}

crate::db_enum!(OrderStatus {
    New => "NEW",
    Paid => "PAID",
    Shipped => "SHIPPED",
});

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Customer {
    pub id: Option<i64>,
    pub name: String,
    pub email: Option<String>,
    pub profile: Option<Box<Profile>>,
    pub orders: Option<Vec<Order>>,
}

impl Entity for Customer {
    fn describe(def: &mut EntityDef<Self>) {
        def.table("customers");
        def.id("id", |c| &c.id, |c| &mut c.id).generated();
        def.column("name", |c| &c.name, |c| &mut c.name);
        def.column("email", |c| &c.email, |c| &mut c.email);
        def.one_to_one("profile", |c| &c.profile, |c| &mut c.profile)
            .mapped_by("customer_id")
            .cascade();
        def.one_to_many("orders", |c| &c.orders, |c| &mut c.orders)
            .mapped_by("customer");
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Profile {
    pub id: Option<i64>,
    pub customer_id: Option<i64>,
    pub bio: String,
}

impl Entity for Profile {
    fn describe(def: &mut EntityDef<Self>) {
        def.table("profiles");
        def.id("id", |p| &p.id, |p| &mut p.id).generated();
        def.column("customer_id", |p| &p.customer_id, |p| &mut p.customer_id);
        def.column("bio", |p| &p.bio, |p| &mut p.bio);
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Order {
    pub id: Option<i64>,
    pub total: Decimal,
    pub status: OrderStatus,
    pub customer_id: Option<i64>,
    pub customer: Option<Box<Customer>>,
    pub lines: Option<Vec<OrderLine>>,
    pub tags: Option<HashSet<Tag>>,
}

impl Entity for Order {
    fn describe(def: &mut EntityDef<Self>) {
        def.table("orders");
        def.id("id", |o| &o.id, |o| &mut o.id).generated();
        def.column("total", |o| &o.total, |o| &mut o.total);
        def.column("status", |o| &o.status, |o| &mut o.status);
        def.column("customer_id", |o| &o.customer_id, |o| &mut o.customer_id);
        def.many_to_one("customer", |o| &o.customer, |o| &mut o.customer);
        def.one_to_many("lines", |o| &o.lines, |o| &mut o.lines)
            .mapped_by("order_id")
            .cascade()
            .orphan_removal();
        def.many_to_many("tags", |o| &o.tags, |o| &mut o.tags)
            .join_table("order_tags", "order_id", "tag_id")
            .cascade();
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderLine {
    pub id: Option<i64>,
    pub order_id: Option<i64>,
    pub product: String,
    pub quantity: i32,
    pub notes: Option<Vec<LineNote>>,
}

impl Entity for OrderLine {
    fn describe(def: &mut EntityDef<Self>) {
        def.table("order_lines");
        def.id("id", |l| &l.id, |l| &mut l.id).generated();
        def.column("order_id", |l| &l.order_id, |l| &mut l.order_id);
        def.column("product", |l| &l.product, |l| &mut l.product);
        def.column("quantity", |l| &l.quantity, |l| &mut l.quantity);
        def.one_to_many("notes", |l| &l.notes, |l| &mut l.notes)
            .mapped_by("line_id")
            .cascade()
            .orphan_removal();
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineNote {
    pub id: Option<i64>,
    pub line_id: Option<i64>,
    pub body: String,
}

impl Entity for LineNote {
    fn describe(def: &mut EntityDef<Self>) {
        def.table("line_notes");
        def.id("id", |n| &n.id, |n| &mut n.id).generated();
        def.column("line_id", |n| &n.line_id, |n| &mut n.line_id);
        def.column("body", |n| &n.body, |n| &mut n.body);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Tag {
    pub id: Option<i64>,
    pub name: String,
}

impl Entity for Tag {
    fn describe(def: &mut EntityDef<Self>) {
        def.table("tags");
        def.id("id", |t| &t.id, |t| &mut t.id).generated();
        def.column("name", |t| &t.name, |t| &mut t.name);
    }
}

/// Caller-assigned identity
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ticket {
    pub id: i64,
    pub subject: String,
}

impl Entity for Ticket {
    fn describe(def: &mut EntityDef<Self>) {
        def.table("tickets");
        def.id("id", |t| &t.id, |t| &mut t.id);
        def.column("subject", |t| &t.subject, |t| &mut t.subject);
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Note {
    pub id: i64,
    pub created_on: NaiveDate,
    pub updated_at: Option<NaiveDateTime>,
    pub payload: Option<serde_json::Value>,
    pub revision: i32,
}

impl Entity for Note {
    fn describe(def: &mut EntityDef<Self>) {
        def.table("notes");
        def.id("id", |n| &n.id, |n| &mut n.id);
        def.column("created_on", |n| &n.created_on, |n| &mut n.created_on)
            .field("createdOn")
            .updatable(false);
        def.column("updated_at", |n| &n.updated_at, |n| &mut n.updated_at);
        def.column("payload", |n| &n.payload, |n| &mut n.payload);
        def.column("revision", |n| &n.revision, |n| &mut n.revision)
            .insertable(false);
    }
}

#[derive(Debug, Default)]
pub struct AuditEntry {
    pub id: Option<i64>,
    pub message: String,
}

impl Entity for AuditEntry {
    fn describe(def: &mut EntityDef<Self>) {
        def.schema("audit").table("entries");
        def.id("id", |a| &a.id, |a| &mut a.id).generated();
        def.column("message", |a| &a.message, |a| &mut a.message);
    }
}

#[derive(Debug, Default)]
pub struct Untabled {
    pub id: Option<i64>,
}

impl Entity for Untabled {
    fn describe(def: &mut EntityDef<Self>) {
        def.id("id", |u| &u.id, |u| &mut u.id);
    }
}

#[derive(Debug, Default)]
pub struct Unidentified {
    pub name: String,
}

impl Entity for Unidentified {
    fn describe(def: &mut EntityDef<Self>) {
        def.table("unidentified");
        def.column("name", |u| &u.name, |u| &mut u.name);
    }
}

/// Owning relation whose default join column (`owner_id`) is never bound
#[derive(Debug, Default)]
pub struct DanglingJoin {
    pub id: Option<i64>,
    pub owner: Option<Box<Customer>>,
}

impl Entity for DanglingJoin {
    fn describe(def: &mut EntityDef<Self>) {
        def.table("dangling");
        def.id("id", |d| &d.id, |d| &mut d.id).generated();
        def.many_to_one("owner", |d| &d.owner, |d| &mut d.owner);
    }
}

/// One-to-many whose `mapped_by` names nothing on the target
#[derive(Debug, Default)]
pub struct Misdirected {
    pub id: Option<i64>,
    pub lines: Option<Vec<OrderLine>>,
}

impl Entity for Misdirected {
    fn describe(def: &mut EntityDef<Self>) {
        def.table("misdirected");
        def.id("id", |m| &m.id, |m| &mut m.id).generated();
        def.one_to_many("lines", |m| &m.lines, |m| &mut m.lines)
            .mapped_by("parent")
            .eager();
    }
}

pub static WIDGET_BUILDS: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug, Default)]
pub struct Widget {
    pub id: Option<i64>,
}

impl Entity for Widget {
    fn describe(def: &mut EntityDef<Self>) {
        WIDGET_BUILDS.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(std::time::Duration::from_millis(10));
        def.table("widgets");
        def.id("id", |w| &w.id, |w| &mut w.id).generated();
    }
}
