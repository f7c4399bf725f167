//! Storylink: Session & Navigation bounded context.
//!
//! Responsible for who a participant is (player identity, client id and
//! role), where it is in the story (the navigation controller and its
//! transition cooldown) and who else is online (presence tracking).

pub mod application;
pub mod domain;
