//! Terminal confirmation prompt

use async_trait::async_trait;
use console::Term;

use convoy_kube::Prompter;

/// Asks on stderr and reads the answer line from stdin
#[derive(Debug, Clone)]
pub struct TermPrompter {
    term: Term,
}

impl TermPrompter {
    pub fn new() -> Self {
        Self {
            term: Term::stderr(),
        }
    }
}

impl Default for TermPrompter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Prompter for TermPrompter {
    async fn ask(&mut self, message: &str) -> std::io::Result<String> {
        let term = self.term.clone();
        let message = message.to_string();
        // Blocking read, off the runtime so Ctrl-C is still observed
        tokio::task::spawn_blocking(move || {
            term.write_str(&message)?;
            term.flush()?;
            let mut answer = String::new();
            std::io::stdin().read_line(&mut answer)?;
            Ok::<_, std::io::Error>(answer)
        })
        .await
        .map_err(std::io::Error::other)?
    }
}
