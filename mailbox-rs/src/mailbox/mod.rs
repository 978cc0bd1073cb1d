//! Mailbox listing
//!
//! Enumerates a user's folders and messages from the message store and
//! fetches single messages through the parser.

pub mod entry;
pub mod index;

pub use entry::{parse_date, resolve_entry_date, MailboxEntry, MessageView};
pub use index::{sort_newest_first, MailboxIndex, INBOX, SENT};
