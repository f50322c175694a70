//! Update routing.
//!
//! - [`commands`] -- `/start`, `/help`, `/mode`, `/mood`, `/reset`, `/privacy`.
//! - [`callbacks`] -- Inline keyboard buttons.
//! - [`owner`] -- Owner-only administration.
//! - [`conversation`] -- Free text answered through the provider chain.

pub mod callbacks;
pub mod commands;
pub mod conversation;
pub mod owner;

use tracing::{debug, warn};

use crate::bot::App;
use crate::helpers::parse_command;
use crate::update::Update;

/// Route one update. Errors are logged; they never reach the polling loop.
pub async fn dispatch(app: &App, update: Update) {
    let result = match update {
        Update::Message(msg) => {
            if !msg.is_private() || msg.from.is_bot {
                return;
            }
            match parse_command(&msg.text) {
                Some((cmd, args)) => match cmd.as_str() {
                    "start" => commands::start(app, &msg).await,
                    "help" => commands::help(app, &msg).await,
                    "mode" => commands::mode(app, &msg).await,
                    "mood" => commands::mood(app, &msg).await,
                    "reset" => commands::reset(app, &msg).await,
                    "privacy" => commands::privacy(app, &msg).await,
                    name if owner::COMMANDS.contains(&name) => {
                        if app.is_owner(msg.from.id) {
                            owner::handle(app, &msg, name, &args).await
                        } else {
                            debug!(user_id = msg.from.id, command = name, "owner command ignored");
                            Ok(())
                        }
                    }
                    _ => conversation::handle(app, &msg).await,
                },
                None if msg.text.trim().is_empty() => Ok(()),
                None => conversation::handle(app, &msg).await,
            }
        }
        Update::Callback(cb) => callbacks::handle(app, &cb).await,
        Update::Other => Ok(()),
    };

    if let Err(e) = result {
        warn!(error = %e, "update handler failed");
    }
}
