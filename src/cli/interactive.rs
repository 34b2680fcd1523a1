use fm_types::{ConfigEdit, ConfigKey, EditError, RuntimeConfig};
use futures::{AsyncWriteExt, FutureExt};
use prettytable::{format, Table};
use rustyline_async::{Readline, SharedWriter};
use tokio::{select, sync::watch};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Command {
    List,
    Exit,
    Edit(ConfigEdit),
}

/// Parses one console line: `help`, `list`, `exit`, or `key = value`.
fn parse_line(line: &str) -> Result<Command, EditError> {
    let (key, value) = match line.split_once('=') {
        Some((key, value)) => (key.trim(), value),
        None => (line.trim(), ""),
    };

    match key {
        "help" | "list" => return Ok(Command::List),
        "exit" => return Ok(Command::Exit),
        _ => {}
    }

    let key = ConfigKey::from_name(key).ok_or_else(|| EditError::UnknownKey(key.to_owned()))?;
    key.parse_value(value).map(Command::Edit)
}

fn render_settings(config: &RuntimeConfig) -> String {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_CLEAN);
    table.set_titles(row!["key", "value", "range"]);

    for key in ConfigKey::ALL {
        let (min, max) = key.range();
        table.add_row(row![key.name(), config.value_of(key), format!("{min} - {max}")]);
    }

    table.to_string()
}

pub async fn run_interactive_cli(
    mut editor: Readline,
    mut stdout: SharedWriter,
    config_tx: watch::Sender<RuntimeConfig>,
    cancellation_token: CancellationToken,
) -> anyhow::Result<()> {
    loop {
        select! {
            _ = cancellation_token.cancelled() => {
                break;
            }
            result = editor.readline().fuse() => {
                match result {
                    Ok(line) => {
                        if line.trim().is_empty() {
                            continue;
                        }

                        stdout.write_all(format!("fm> {}\n", line).as_bytes()).await?;

                        let command = match parse_line(&line) {
                            Ok(command) => command,
                            Err(err) => {
                                stdout.write_all(format!("error: {}\n", err).as_bytes()).await?;
                                continue;
                            }
                        };

                        editor.add_history_entry(line);

                        match command {
                            Command::List => {
                                let table = render_settings(&config_tx.borrow());
                                stdout.write_all(table.as_bytes()).await?;
                            }

                            Command::Edit(edit) => {
                                config_tx.send_modify(|config| *config = config.apply(edit));

                                let key = edit.key();
                                let value = config_tx.borrow().value_of(key);
                                info!("{} set to {}", key, value);
                                stdout.write_all(format!("OK: {} = {}\n", key, value).as_bytes()).await?;
                            }

                            Command::Exit => {
                                info!("exiting");
                                cancellation_token.cancel();
                            }
                        };
                    }
                    Err(err) => {
                        error!("interactive error: {:#?}", err);
                        break;
                    }
                };
            }
        }
    }

    cancellation_token.cancel();

    Ok(())
}
