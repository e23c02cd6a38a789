//! Command-line interface for modbot.
//!
//! Provides an interactive console that drives the engine over an
//! in-memory gateway, plus one-shot commands for the classifier and the
//! categorizer.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::adapters::{Classifier, HttpClassifier, InMemoryGateway, OpenAiAdapter};
use crate::config::{self, mask_secret, ResolvedConfig};
use crate::core::{Categorizer, Orchestrator, PriorityQueue};
use crate::domain::{ChannelId, GuildId, InboundMessage, UserId};

const CONSOLE_GUILD: GuildId = 1;
const USER_CHANNEL: ChannelId = 10;
const MOD_CHANNEL: ChannelId = 11;
const BOT_USER: UserId = 1;

/// modbot - moderation workflow engine
#[derive(Parser, Debug)]
#[command(name = "modbot")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interactive session against an in-memory chat server
    Console,

    /// Run the LLM categorization on a message
    Categorize {
        /// Message text
        text: String,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Send a message to the classifier
    Classify {
        /// Message text
        text: String,
    },

    /// Show current configuration
    Config,
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Console => run_console().await,
            Commands::Categorize { text, json } => categorize(&text, json).await,
            Commands::Classify { text } => classify(&text).await,
            Commands::Config => show_config(),
        }
    }
}

fn build_classifier(cfg: &ResolvedConfig) -> Option<Arc<dyn Classifier>> {
    cfg.classifier.as_ref().map(|settings| {
        let mut classifier = HttpClassifier::new(&settings.url);
        if let Some(ref token) = settings.token {
            classifier = classifier.with_token(token);
        }
        Arc::new(classifier) as Arc<dyn Classifier>
    })
}

fn build_categorizer(cfg: &ResolvedConfig) -> Option<Categorizer> {
    cfg.llm.as_ref().map(|settings| {
        let llm = OpenAiAdapter::new(&settings.api_key)
            .with_base_url(&settings.base_url)
            .with_model(&settings.model);
        Categorizer::new(Arc::new(llm), cfg.retry.clone())
    })
}

async fn categorize(text: &str, json: bool) -> Result<()> {
    let cfg = config::config()?;
    let categorizer = build_categorizer(cfg)
        .context("No LLM configured. Set MODBOT_LLM_API_KEY or llm.api_key in the config file")?;

    let result = categorizer.categorize(text, None).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let show = |value: Option<String>| value.unwrap_or_else(|| "(unknown)".to_string());
    println!("Type:           {}", show(result.misinfo_type.map(|t| t.to_string())));
    println!("Subtype:        {}", show(result.misinfo_subtype.map(|s| s.to_string())));
    println!("Imminent harm:  {}", show(result.imminent_harm.map(|h| h.to_string())));
    println!("Recommendation: {}", show(result.recommendation.map(|r| r.to_string())));
    Ok(())
}

async fn classify(text: &str) -> Result<()> {
    let cfg = config::config()?;
    let classifier = build_classifier(cfg)
        .context("No classifier configured. Set MODBOT_CLASSIFIER_URL or classifier.url in the config file")?;

    let classification = classifier.classify(text).await?;
    println!(
        "{} (confidence {:.2})",
        serde_json::to_value(classification.label)?
            .as_str()
            .unwrap_or("unknown"),
        classification.confidence
    );
    Ok(())
}

fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("modbot configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Channels:");
    println!("  User:       {}", cfg.channels.user_channel);
    println!("  Moderation: {}", cfg.channels.mod_channel);
    println!();
    println!("Queue lanes:");
    for (priority, name) in cfg.lanes.iter().enumerate() {
        println!("  {}: {}", priority, name);
    }
    println!();
    match cfg.classifier {
        Some(ref classifier) => {
            println!("Classifier: {}", classifier.url);
            if let Some(ref token) = classifier.token {
                println!("  Token: {}", mask_secret(token));
            }
        }
        None => println!("Classifier: (disabled)"),
    }
    match cfg.llm {
        Some(ref llm) => {
            println!("LLM: {} @ {}", llm.model, llm.base_url);
            println!("  API key: {}", mask_secret(&llm.api_key));
        }
        None => println!("LLM: (disabled)"),
    }
    println!();
    println!("Retry:");
    println!("  Max attempts: {}", cfg.retry.max_attempts);
    println!("  Delay:        {:?}", cfg.retry.delay);

    Ok(())
}

/// Console users by name, created on first use
#[derive(Default)]
struct ConsoleUsers {
    ids: HashMap<String, UserId>,
}

impl ConsoleUsers {
    fn id(&mut self, name: &str) -> UserId {
        let next = 100 + self.ids.len() as UserId;
        *self.ids.entry(name.to_string()).or_insert(next)
    }

    fn dm_channel(user_id: UserId) -> ChannelId {
        10_000 + user_id
    }

    fn name_for_dm(&self, channel_id: ChannelId) -> Option<&str> {
        self.ids
            .iter()
            .find(|(_, id)| Self::dm_channel(**id) == channel_id)
            .map(|(name, _)| name.as_str())
    }
}

async fn run_console() -> Result<()> {
    let cfg = config::config()?;

    let gateway = Arc::new(InMemoryGateway::new());
    gateway.add_guild(CONSOLE_GUILD, "console").await;
    gateway
        .add_channel(CONSOLE_GUILD, USER_CHANNEL, &cfg.channels.user_channel)
        .await;
    gateway
        .add_channel(CONSOLE_GUILD, MOD_CHANNEL, &cfg.channels.mod_channel)
        .await;

    let mut orchestrator = Orchestrator::new(gateway.clone(), PriorityQueue::new(cfg.lanes.clone()))
        .with_channel_names(cfg.channels.clone())
        .with_bot_user(BOT_USER);
    if let Some(classifier) = build_classifier(cfg) {
        orchestrator = orchestrator.with_classifier(classifier);
    }
    if let Some(categorizer) = build_categorizer(cfg) {
        orchestrator = orchestrator.with_categorizer(categorizer);
    }
    orchestrator.register_guild(CONSOLE_GUILD).await?;

    println!("modbot console. Commands:");
    println!("  dm <user> <text>    direct message to the bot");
    println!("  post <user> <text>  post in #{}", cfg.channels.user_channel);
    println!("  mod <user> <text>   post in #{}", cfg.channels.mod_channel);
    println!("  quit");

    let mut users = ConsoleUsers::default();
    let mut reactions_seen = 0;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" {
            break;
        }

        let mut parts = line.splitn(3, ' ');
        let (command, user, text) = match (parts.next(), parts.next(), parts.next()) {
            (Some(command), Some(user), Some(text)) => (command, user, text),
            _ => {
                eprintln!("usage: dm|post|mod <user> <text>");
                continue;
            }
        };
        let user_id = users.id(user);

        let message = match command {
            "dm" => InboundMessage::direct(user_id, user, ConsoleUsers::dm_channel(user_id), text),
            "post" | "mod" => {
                let channel = if command == "post" { USER_CHANNEL } else { MOD_CHANNEL };
                let posted = gateway
                    .post(CONSOLE_GUILD, channel, user_id, user, text)
                    .await;
                println!("  (posted {})", posted.link());
                InboundMessage::in_guild(user_id, user, posted, text)
            }
            other => {
                eprintln!("unknown command: {}", other);
                continue;
            }
        };

        if let Err(e) = orchestrator.handle_message(message).await {
            eprintln!("error: {:#}", e);
        }

        for sent in gateway.take_sent().await {
            let target = match sent.channel_id {
                USER_CHANNEL => format!("#{}", cfg.channels.user_channel),
                MOD_CHANNEL => format!("#{}", cfg.channels.mod_channel),
                other => format!("dm:{}", users.name_for_dm(other).unwrap_or("?")),
            };
            println!("[{}] {}", target, sent.text);
        }
        let reactions = gateway.reactions().await;
        for (message, emoji) in reactions.iter().skip(reactions_seen) {
            println!("[reaction] {} on {}", emoji, message.link());
        }
        reactions_seen = reactions.len();
    }

    Ok(())
}
