//! LSP request/notification handlers.

mod code_lens;
mod commands;
mod configuration;
mod documents;
mod initialize;

pub use code_lens::{handle_code_lens, handle_code_lens_resolve};
pub use commands::{
    COMMANDS, PROBE_QUOTA_COMMAND, RESET_CACHE_COMMAND, SET_KEY_COMMAND,
    TOGGLE_ANNOTATIONS_COMMAND, handle_execute_command,
};
pub use configuration::handle_did_change_configuration;
pub use documents::{handle_did_change, handle_did_close, handle_did_open, handle_did_save};
pub use initialize::{handle_initialize, handle_initialized, handle_shutdown};
