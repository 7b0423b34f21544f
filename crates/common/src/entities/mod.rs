pub mod attestations;
pub mod committee_members;
pub mod email_outbox;
pub mod events;
pub mod registrations;
pub mod scientific_committees;
pub mod sessions;
pub mod submissions;
pub mod users;
