//! CLI `chat` command: talk to Akira from the terminal.

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use akira::akira::Akira;
use akira::config::AkiraConfig;
use akira::persona::{processing_apology, Mood, COMMAND_HELP, GREETING};

/// Sender identifier used when `--user` is not given; it sanitizes to the shared key `_`.
pub const LOCAL_USER: &str = "local";

/// Read messages from stdin until EOF or a farewell.
pub async fn chat(config: &AkiraConfig, user: Option<&str>) -> Result<()> {
    let akira = Akira::from_config(config)?;
    let user = user.unwrap_or(LOCAL_USER);

    let input = BufReader::new(tokio::io::stdin());
    let mut output = tokio::io::stdout();
    converse(&akira, user, input, &mut output).await
}

async fn converse<R, W>(akira: &Akira, user: &str, input: R, output: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let greeting = format!("Akira {}: {GREETING}\n{COMMAND_HELP}\n\n", Mood::Neutral.emoji());
    output.write_all(greeting.as_bytes()).await?;

    let mut lines = input.lines();
    loop {
        output.write_all("Tú: ".as_bytes()).await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let message = line.trim();
        if message.is_empty() {
            continue;
        }

        let mood = Mood::detect(message);
        // A failed turn is answered like any other; the session goes on.
        let reply = match akira.reply(user, message).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "turn failed");
                processing_apology(&e)
            }
        };
        let line = format!("Akira {}: {reply}\n\n", mood.emoji());
        output.write_all(line.as_bytes()).await?;

        if mood == Mood::Bye {
            break;
        }
    }

    output.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use akira::akira::AkiraSettings;
    use akira::config::SaveErrorPolicy;
    use akira::media::analyzer::MediaAnalyzer;
    use akira::memory::types::UserState;
    use akira::store::{StateStore, StoreError, UserKey};

    use super::*;

    struct UnwritableStore;

    impl StateStore for UnwritableStore {
        fn backend(&self) -> &'static str {
            "unwritable"
        }

        fn read(&self, _key: &UserKey) -> Result<Option<UserState>, StoreError> {
            Ok(None)
        }

        fn save(&self, _key: &UserKey, _state: &UserState) -> Result<(), StoreError> {
            Err(StoreError::Poisoned)
        }

        fn remove(&self, _key: &UserKey) -> Result<bool, StoreError> {
            Ok(false)
        }

        fn keys(&self) -> Result<Vec<UserKey>, StoreError> {
            Ok(Vec::new())
        }
    }

    fn failing_akira() -> Akira {
        let config = AkiraConfig::default();
        let completion = akira::completion::create_service(&config.completion).unwrap();
        let analyzer = MediaAnalyzer::from_config(Arc::clone(&completion), &config);
        let settings = AkiraSettings {
            on_save_error: SaveErrorPolicy::Fail,
            ..AkiraSettings::default()
        };
        Akira::new(Arc::new(UnwritableStore), completion, analyzer, settings)
    }

    #[tokio::test]
    async fn failed_turns_do_not_end_the_session() {
        let akira = failing_akira();
        let input: &[u8] = b"me llamo Ana\nme gusta el t\xc3\xa9\n";
        let mut output = Vec::new();

        converse(&akira, LOCAL_USER, input, &mut output).await.unwrap();

        let transcript = String::from_utf8(output).unwrap();
        assert_eq!(transcript.matches("tuve un problema procesando").count(), 2);
        assert!(transcript.ends_with("Tú: "));
    }

    #[tokio::test]
    async fn farewell_ends_the_session() {
        let akira = failing_akira();
        let input: &[u8] = b"me llamo Ana, adi\xc3\xb3s\nme llamo Beto\n";
        let mut output = Vec::new();

        converse(&akira, LOCAL_USER, input, &mut output).await.unwrap();

        let transcript = String::from_utf8(output).unwrap();
        assert_eq!(transcript.matches("Tú: ").count(), 1);
    }
}
