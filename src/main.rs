mod app;
mod backend;
mod cache;
mod config;
mod db;
mod i18n;
mod logging;
mod nav;
mod notifications;
mod queue;
mod sync;
#[cfg(test)]
mod testing;
mod worker;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use std::path::PathBuf;

use crate::i18n::Language;
use crate::nav::Role;
use crate::notifications::{NewNotification, NotificationType, Priority};

#[derive(Parser, Debug)]
#[command(name = "abathwa-worker")]
#[command(about = "Offline action queue, cache router and notification store for Abathwa Capital")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/abathwa/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Host the worker: JSON events on stdin, replies and broadcasts on stdout
  Run,
  /// Queue an action for the next sync
  Enqueue {
    /// e.g. CREATE_OPPORTUNITY, CREATE_OFFER, UPDATE_PROFILE
    action_type: String,
    /// JSON payload
    #[arg(default_value = "{}")]
    data: String,
  },
  /// Replay every queued action against the backend now
  Sync,
  /// List queued actions
  Queue,
  /// List urls cached in a bucket, oldest first
  Cached {
    /// e.g. api-cache, webfonts, images, stylesheets, offline-fallbacks
    bucket: String,
  },
  /// Manage a user's local notifications
  Notifications {
    #[command(subcommand)]
    command: NotificationCommand,
  },
  /// Show or search the navigation menu for a role
  Menu {
    #[arg(value_enum)]
    role: Role,
    #[arg(short, long)]
    search: Option<String>,
  },
  /// Look up a UI string
  Translate {
    key: String,
    #[arg(short, long, value_enum, default_value_t = Language::En)]
    lang: Language,
    /// Placeholder value as name=value, may be repeated
    #[arg(short, long = "arg", value_parser = parse_placeholder)]
    args: Vec<(String, String)>,
  },
}

#[derive(Subcommand, Debug)]
enum NotificationCommand {
  List {
    user: String,
    #[arg(long)]
    unread: bool,
  },
  /// Count unread notifications
  Unread { user: String },
  Add {
    user: String,
    title: String,
    message: String,
    #[arg(long, value_enum, default_value_t = NotificationType::System)]
    kind: NotificationType,
    #[arg(long, value_enum, default_value_t = Priority::Medium)]
    priority: Priority,
    #[arg(long)]
    action_url: Option<String>,
  },
  /// Mark one notification, or all of them, as read
  Read { user: String, id: Option<String> },
  Delete { user: String, id: String },
  Clear { user: String },
  /// Record a marketplace event for a user
  Notify {
    user: String,
    #[command(subcommand)]
    event: MarketplaceEvent,
  },
}

#[derive(Subcommand, Debug)]
enum MarketplaceEvent {
  OpportunityCreated {
    opportunity_id: String,
    name: String,
  },
  OfferReceived {
    offer_id: String,
    opportunity: String,
    amount: f64,
  },
  /// Offer accepted, or declined with --declined
  OfferDecided {
    offer_id: String,
    opportunity: String,
    #[arg(long)]
    declined: bool,
  },
  PaymentReceived {
    payment_id: String,
    amount: f64,
  },
  NewMessage {
    conversation_id: String,
    sender: String,
  },
  SystemAnnouncement {
    title: String,
    message: String,
  },
}

fn parse_placeholder(s: &str) -> Result<(String, String), String> {
  s.split_once('=')
    .map(|(name, value)| (name.to_string(), value.to_string()))
    .ok_or_else(|| format!("expected name=value, got {}", s))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Pure lookups need neither config nor storage
  match &args.command {
    Command::Menu { role, search } => {
      return match search {
        Some(input) => print_json(&nav::search_menu(*role, input)),
        None => print_json(&nav::menu_for(*role)),
      };
    }
    Command::Translate {
      key,
      lang,
      args: placeholders,
    } => {
      let placeholders: Vec<(&str, &str)> = placeholders
        .iter()
        .map(|(name, value)| (name.as_str(), value.as_str()))
        .collect();
      println!("{}", i18n::translate_with(*lang, key, &placeholders));
      return Ok(());
    }
    _ => {}
  }

  let config = config::Config::load(args.config.as_deref())?;
  let _log_guard = logging::init(&config.log_dir()?)?;
  let app = app::App::new(config)?;

  match args.command {
    Command::Run => app.run_worker().await?,
    Command::Enqueue { action_type, data } => {
      let data: serde_json::Value =
        serde_json::from_str(&data).map_err(|e| eyre!("Invalid JSON payload: {}", e))?;
      let id = app.enqueue(&action_type, &data)?;
      println!(
        "Queued {} as #{} ({} pending)",
        action_type,
        id,
        app.pending_count()?
      );
    }
    Command::Sync => print_json(&app.sync().await?)?,
    Command::Queue => print_json(&app.pending()?)?,
    Command::Cached { bucket } => print_json(&app.cached_urls(&bucket)?)?,
    Command::Notifications { command } => run_notifications(&app, command)?,
    Command::Menu { .. } | Command::Translate { .. } => {}
  }

  Ok(())
}

fn run_notifications(app: &app::App, command: NotificationCommand) -> Result<()> {
  let store = app.notifications();
  match command {
    NotificationCommand::List { user, unread } => {
      let list = if unread {
        store.unread(&user)?
      } else {
        store.list(&user)?
      };
      print_json(&list)
    }
    NotificationCommand::Unread { user } => {
      println!("{}", store.unread_count(&user)?);
      Ok(())
    }
    NotificationCommand::Add {
      user,
      title,
      message,
      kind,
      priority,
      action_url,
    } => {
      let mut new = NewNotification::new(&user, kind, &title, &message).priority(priority);
      if let Some(url) = action_url {
        new = new.action_url(&url);
      }
      print_json(&store.create(new)?)
    }
    NotificationCommand::Read { user, id: Some(id) } => {
      if !store.mark_as_read(&user, &id)? {
        return Err(eyre!("No notification {} for {}", id, user));
      }
      Ok(())
    }
    NotificationCommand::Read { user, id: None } => {
      let changed = store.mark_all_as_read(&user)?;
      println!("Marked {} notifications as read", changed);
      Ok(())
    }
    NotificationCommand::Delete { user, id } => {
      if !store.delete(&user, &id)? {
        return Err(eyre!("No notification {} for {}", id, user));
      }
      Ok(())
    }
    NotificationCommand::Clear { user } => store.clear_all(&user),
    NotificationCommand::Notify { user, event } => {
      let record = match event {
        MarketplaceEvent::OpportunityCreated {
          opportunity_id,
          name,
        } => store.opportunity_created(&user, &opportunity_id, &name)?,
        MarketplaceEvent::OfferReceived {
          offer_id,
          opportunity,
          amount,
        } => store.offer_received(&user, &offer_id, &opportunity, amount)?,
        MarketplaceEvent::OfferDecided {
          offer_id,
          opportunity,
          declined,
        } => store.offer_decided(&user, &offer_id, &opportunity, !declined)?,
        MarketplaceEvent::PaymentReceived { payment_id, amount } => {
          store.payment_received(&user, &payment_id, amount)?
        }
        MarketplaceEvent::NewMessage {
          conversation_id,
          sender,
        } => store.new_message(&user, &conversation_id, &sender)?,
        MarketplaceEvent::SystemAnnouncement { title, message } => {
          store.system_announcement(&user, &title, &message)?
        }
      };
      print_json(&record)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_translate_placeholders_parse() {
    let args = Args::try_parse_from([
      "abathwa-worker",
      "translate",
      "sync.complete",
      "--lang",
      "fr",
      "--arg",
      "count=3",
    ])
    .unwrap();
    match args.command {
      Command::Translate { lang, args, .. } => {
        assert_eq!(lang, Language::Fr);
        assert_eq!(args, vec![("count".to_string(), "3".to_string())]);
      }
      other => panic!("unexpected command {:?}", other),
    }
  }

  #[test]
  fn test_placeholder_without_equals_rejected() {
    assert!(parse_placeholder("count").is_err());
    assert_eq!(
      parse_placeholder("a=b=c").unwrap(),
      ("a".to_string(), "b=c".to_string())
    );
  }

  #[test]
  fn test_notify_offer_declined_parses() {
    let args = Args::try_parse_from([
      "abathwa-worker",
      "notifications",
      "notify",
      "u1",
      "offer-decided",
      "o-1",
      "Agri Hub",
      "--declined",
    ])
    .unwrap();
    match args.command {
      Command::Notifications {
        command: NotificationCommand::Notify { user, event },
      } => {
        assert_eq!(user, "u1");
        assert!(matches!(event, MarketplaceEvent::OfferDecided { declined: true, .. }));
      }
      other => panic!("unexpected command {:?}", other),
    }
  }

  #[test]
  fn test_cli_definition_is_valid() {
    use clap::CommandFactory;
    Args::command().debug_assert();
  }
}

