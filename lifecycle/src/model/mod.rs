//! Domain model: tickets, users, roles and teams

pub mod actor;
pub mod team;
pub mod ticket;

pub use actor::{Actor, Role, UnknownRole, User, UserId};
pub use team::Team;
pub use ticket::{
    format_ticket_id, is_valid_ticket_id, AttachmentRef, Category, Feedback, Priority, Severity,
    Ticket, TicketId,
};

pub use crate::state_machine::TicketStatus;
