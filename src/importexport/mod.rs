//! Session state files: export a session to portable JSON and import it
//! back into this or another store.

pub mod export;
pub mod import;
pub mod state;

pub use export::{export_session, export_to_file};
pub use import::{import_into_new_session, open_state_file, write_state_to_database, ImportReport};
pub use state::{read_state_from_file, StateFile, FILE_PATH_KEY, STATE_FILE_VERSION};
