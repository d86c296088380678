//! dcvim: bootstrap an ephemeral devcontainer, attach Vim/Neovim to it, and
//! keep port-forwarding relays plus a host clipboard bridge alive for the
//! session.
//!
//! Module map
//! - [`bootstrap`]: the start/stop orchestration and rollback path.
//! - [`engine`] / [`descriptor`]: subprocess wrappers for the container
//!   runtime and the devcontainer CLI (external collaborators).
//! - [`forward`]: in-container forward markers and host-side TCP relays.
//! - [`clipboard`]: clipboard-data-receiver lifecycle.
//! - [`editor`] / [`provision`]: editor selection and tool downloads.

pub mod arch;
pub mod bootstrap;
pub mod clipboard;
pub mod descriptor;
pub mod doctor;
pub mod editor;
pub mod engine;
pub mod errors;
pub mod forward;
pub mod platform;
pub mod provision;
pub mod retry;
pub mod util;

pub use arch::normalize_container_arch;
pub use bootstrap::{AttachContext, AttachService, DefaultAttachService, StartOptions};
pub use clipboard::{ClipboardRelayHandle, ClipboardRelayManager};
pub use descriptor::{DescriptorCli, ForwardSpec};
pub use editor::{resolve_editor_choice, EditorDescriptor};
pub use engine::Engine;
pub use errors::{exit_code_for_bootstrap_error, BootstrapError};
pub use forward::{start_relay, ForwardRegistry, ForwardTarget, Relay};
pub use platform::Platform;
pub use provision::{Tool, ToolCatalog, ToolKind};
pub use retry::{await_ready, Timeout};
pub use util::{shell_escape, shell_join};
