//! Message commands.

use super::{print_json, Format};
use zaindb_board::{AppContext, IdFilter, Message, MessageFilter};

/// Builds a search filter from command-line criteria.
pub fn filter(
    name: Option<String>,
    mail: Option<String>,
    content: Option<String>,
    time: Option<String>,
    id: Option<&str>,
) -> Result<MessageFilter, Box<dyn std::error::Error>> {
    let id_filter = id.map(str::parse::<IdFilter>).transpose()?;
    let filter = MessageFilter {
        name,
        mail,
        content,
        time,
        id_filter,
    };
    if filter.is_empty() {
        return Err("Give at least one of --name, --mail, --content, --time or --id".into());
    }
    Ok(filter)
}

/// Adds `count` placeholder messages.
pub async fn add(
    app: &AppContext,
    count: usize,
    format: Format,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut ids = Vec::with_capacity(count);
    for _ in 0..count {
        ids.push(app.messages().try_create().await?);
    }
    match format {
        Format::Json => print_json(&ids.iter().filter_map(|k| k.as_integer()).collect::<Vec<_>>())?,
        Format::Text => {
            for id in &ids {
                println!("Added message {id}");
            }
        }
    }
    Ok(())
}

/// Lists every message.
pub async fn list(app: &AppContext, format: Format) -> Result<(), Box<dyn std::error::Error>> {
    let messages = app.messages().fetch_all().await?;
    print_messages(&messages, format)
}

/// Prints the messages matching `filter`.
pub async fn search(
    app: &AppContext,
    filter: &MessageFilter,
    format: Format,
) -> Result<(), Box<dyn std::error::Error>> {
    let messages = app.messages().find(filter).await?;
    print_messages(&messages, format)
}

/// Rewrites the given fields of message `id`.
pub async fn edit(
    app: &AppContext,
    id: i64,
    name: Option<String>,
    mail: Option<String>,
    content: Option<String>,
    format: Format,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut message = lookup(app, id).await?;

    if let Some(name) = name {
        message.name = name;
    }
    if let Some(mail) = mail {
        message.mail = mail;
    }
    if let Some(content) = content {
        message.content = content;
    }
    app.messages().try_replace(message.clone()).await?;
    print_messages(&[message], format)
}

/// Fetches message `id` through the id index.
async fn lookup(app: &AppContext, id: i64) -> Result<Message, Box<dyn std::error::Error>> {
    let filter = MessageFilter::default().id_filter(IdFilter::only(id));
    let message = app.messages().find(&filter).await?.into_iter().next();
    message.ok_or_else(|| format!("No message with id {id}").into())
}

/// Deletes message `id`.
pub async fn delete(app: &AppContext, id: i64) -> Result<(), Box<dyn std::error::Error>> {
    match app.messages().try_remove(id).await? {
        0 => println!("No message with id {id}"),
        _ => println!("Deleted message {id}"),
    }
    Ok(())
}

/// Deletes every message.
pub async fn clear(app: &AppContext) -> Result<(), Box<dyn std::error::Error>> {
    app.messages().try_clear().await?;
    println!("Cleared all messages");
    Ok(())
}

fn print_messages(messages: &[Message], format: Format) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        Format::Json => print_json(&messages)?,
        Format::Text => {
            if messages.is_empty() {
                println!("No messages");
            }
            for message in messages {
                println!("{}", line(message));
            }
        }
    }
    Ok(())
}

fn line(message: &Message) -> String {
    let id = message.id.map_or_else(|| "-".to_string(), |id| id.to_string());
    format!(
        "#{id:<4} {}  {} <{}>  {}",
        message.time, message.name, message.mail, message.content
    )
}
