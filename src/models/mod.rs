//! Domain models for the ledger core.

mod account;
mod entry;

pub use account::{Account, AccountType, CreateAccount, NormalSide};
pub use entry::{
    EntryFilter, EntryLine, EntrySource, EntryStatus, NewEntry, NewLine, SourceRef,
    TransactionEntry,
};
