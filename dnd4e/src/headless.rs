//! Headless mode for the character manager.
//!
//! A line-oriented protocol for driving the creation wizard and the
//! character roster without a UI. Designed for scripting and automated
//! testing.

use dnd4e_core::{
    rules, CharacterId, CharacterPatch, CharacterRepository, DraftManager, Store, StoreError,
    WizardStep,
};
use std::io::{self, BufRead, Write};

/// A parsed `#` command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    New,
    Drafts,
    Resume(CharacterId),
    Set(CharacterPatch),
    Phase(i64),
    Next,
    Back,
    Points,
    Races,
    Classes,
    Finalize,
    Discard,
    List,
    Select(CharacterId),
    Show,
    Delete(CharacterId),
    Help,
    Quit,
}

impl Command {
    /// Parse a line that starts with `#`.
    pub fn parse(line: &str) -> Result<Command, String> {
        let body = line
            .strip_prefix('#')
            .ok_or_else(|| "Commands start with #".to_string())?;
        let (name, rest) = match body.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (body, ""),
        };

        let command = match name {
            "new" => Command::New,
            "drafts" => Command::Drafts,
            "resume" => Command::Resume(parse_id(rest, "#resume <id>")?),
            "set" => {
                if rest.is_empty() {
                    return Err("Usage: #set <json patch>".to_string());
                }
                let patch: CharacterPatch =
                    serde_json::from_str(rest).map_err(|e| format!("Invalid patch: {e}"))?;
                Command::Set(patch)
            }
            "phase" => {
                let phase = rest
                    .parse()
                    .map_err(|_| "Usage: #phase <number>".to_string())?;
                Command::Phase(phase)
            }
            "next" => Command::Next,
            "back" => Command::Back,
            "points" => Command::Points,
            "races" => Command::Races,
            "classes" => Command::Classes,
            "finalize" => Command::Finalize,
            "discard" => Command::Discard,
            "list" => Command::List,
            "select" => Command::Select(parse_id(rest, "#select <id>")?),
            "show" => Command::Show,
            "delete" => Command::Delete(parse_id(rest, "#delete <id>")?),
            "help" => Command::Help,
            "quit" | "exit" => Command::Quit,
            _ => return Err("Unknown command. Type #help for help.".to_string()),
        };
        Ok(command)
    }
}

fn parse_id(text: &str, usage: &str) -> Result<CharacterId, String> {
    if text.is_empty() {
        return Err(format!("Usage: {usage}"));
    }
    text.parse().map_err(|_| format!("Not a valid id: {text}"))
}

/// Wizard and roster state for one headless session.
pub struct HeadlessSession {
    drafts: DraftManager,
    repository: CharacterRepository,
    current_draft: Option<CharacterId>,
}

impl HeadlessSession {
    pub async fn new(store: Store) -> Result<Self, StoreError> {
        Ok(Self {
            drafts: DraftManager::new(store.clone()),
            repository: CharacterRepository::load(store).await?,
            current_draft: None,
        })
    }

    pub fn current_draft(&self) -> Option<CharacterId> {
        self.current_draft
    }

    /// Run one command and return the lines to print.
    pub async fn execute(&mut self, command: Command) -> Result<Vec<String>, StoreError> {
        let mut out = Vec::new();
        match command {
            Command::New => {
                let id = self.drafts.create_draft().await?;
                self.current_draft = Some(id);
                out.push(format!("[DRAFT] {id}"));
                out.push(format!("[STEP] {}", WizardStep::Race));
            }
            Command::Drafts => {
                let drafts = self.drafts.list_drafts().await?;
                if drafts.is_empty() {
                    out.push("[DRAFTS] none".to_string());
                }
                for draft in drafts {
                    out.push(format!(
                        "[DRAFT] {} {} - {} ({})",
                        draft.id,
                        draft.data.name,
                        draft.data.summary(),
                        draft.step()
                    ));
                }
            }
            Command::Resume(id) => match self.drafts.resume_draft(id).await? {
                Some((draft, step)) => {
                    self.current_draft = Some(draft.id);
                    out.push(format!("[DRAFT] {} {}", draft.id, draft.data.name));
                    out.push(format!("[STEP] {step}"));
                }
                None => out.push(format!("[ERROR] No draft {id}")),
            },
            Command::Set(patch) => {
                let Some(id) = self.current_draft else {
                    return Ok(no_draft());
                };
                self.drafts.update_draft(id, &patch, None).await?;
                out.push("[SAVED]".to_string());
            }
            Command::Phase(phase) => {
                let Some(id) = self.current_draft else {
                    return Ok(no_draft());
                };
                self.drafts
                    .update_draft(id, &CharacterPatch::new(), Some(phase))
                    .await?;
                out.push(format!("[STEP] {}", WizardStep::from_phase(phase)));
            }
            Command::Next => return self.step_draft(true).await,
            Command::Back => return self.step_draft(false).await,
            Command::Points => {
                let Some(id) = self.current_draft else {
                    return Ok(no_draft());
                };
                let Some(draft) = self.drafts.get_draft(id).await? else {
                    return Ok(vec![format!("[ERROR] No draft {id}")]);
                };
                let scores = &draft.data.abilities;
                out.push(format!(
                    "[POINTS] spent {} of {}, {} remaining ({})",
                    rules::total_points_spent(scores),
                    rules::POINT_BUY_BUDGET,
                    rules::points_remaining(scores),
                    rules::point_buy_status(scores).label()
                ));
            }
            Command::Races => {
                let races = self.drafts.race_options().await?;
                out.push(format!("[RACES] {}", races.join(", ")));
            }
            Command::Classes => {
                let classes = self.drafts.class_options().await?;
                out.push(format!("[CLASSES] {}", classes.join(", ")));
            }
            Command::Finalize => {
                let Some(id) = self.current_draft else {
                    return Ok(no_draft());
                };
                let character = self.drafts.finalize_draft(id).await?;
                self.current_draft = None;
                self.repository.list_characters().await?;
                self.repository.select_character(character.id);
                out.push(format!(
                    "[CHARACTER] {} {} - {}",
                    character.id,
                    character.name,
                    character.summary()
                ));
            }
            Command::Discard => {
                let Some(id) = self.current_draft.take() else {
                    return Ok(no_draft());
                };
                self.drafts.delete_draft(id).await?;
                out.push(format!("[DISCARDED] {id}"));
            }
            Command::List => {
                let characters = self.repository.list_characters().await?;
                if characters.is_empty() {
                    out.push("[CHARACTERS] none".to_string());
                }
                let active = self.repository.active_character().map(|c| c.id);
                for character in &characters {
                    let marker = if Some(character.id) == active { "*" } else { " " };
                    out.push(format!(
                        "[CHARACTER]{marker}{} {} - {}",
                        character.id,
                        character.name,
                        character.summary()
                    ));
                }
            }
            Command::Select(id) => match self.repository.select_character(id) {
                Some(character) => out.push(format!("[SELECTED] {}", character.name)),
                None => out.push(format!("[ERROR] No character {id}")),
            },
            Command::Show => match self.repository.active_character() {
                Some(character) => {
                    out.push(serde_json::to_string_pretty(character)?);
                }
                None => out.push("[ERROR] No character selected. Use #select <id>.".to_string()),
            },
            Command::Delete(id) => {
                self.repository.delete_character(id).await?;
                out.push(format!("[DELETED] {id}"));
            }
            Command::Help => out.extend(help_lines()),
            Command::Quit => out.push("Goodbye!".to_string()),
        }
        Ok(out)
    }

    /// Move the current draft one wizard step forward or back.
    async fn step_draft(&mut self, forward: bool) -> Result<Vec<String>, StoreError> {
        let Some(id) = self.current_draft else {
            return Ok(no_draft());
        };
        let Some(draft) = self.drafts.get_draft(id).await? else {
            self.current_draft = None;
            return Ok(vec![format!("[ERROR] No draft {id}")]);
        };

        let step = draft.step();
        let target = if forward { step.next() } else { step.previous() };
        let Some(target) = target else {
            return Ok(vec![format!("[STEP] {step} (no further step)")]);
        };
        self.drafts
            .update_draft(id, &CharacterPatch::new(), Some(target.phase()))
            .await?;
        Ok(vec![format!("[STEP] {target}")])
    }
}

fn no_draft() -> Vec<String> {
    vec!["[ERROR] No current draft. Use #new or #resume <id>.".to_string()]
}

fn help_lines() -> Vec<String> {
    [
        "[HELP]",
        "  #new             - Start a new draft",
        "  #drafts          - List drafts, newest first",
        "  #resume <id>     - Continue a draft",
        "  #set <json>      - Apply a patch, e.g. #set {\"race\":\"Elf\"}",
        "  #phase <n>       - Move the draft to wizard phase n",
        "  #next / #back    - Step the wizard",
        "  #points          - Show point-buy spend",
        "  #races / #classes - List compendium options",
        "  #finalize        - Save the draft as a character",
        "  #discard         - Delete the current draft",
        "  #list            - List characters",
        "  #select <id>     - Make a character active",
        "  #show            - Print the active character",
        "  #delete <id>     - Delete a character",
        "  #quit            - Exit",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Run the headless loop over stdin until EOF or `#quit`.
pub async fn run_headless(store: Store) -> Result<(), StoreError> {
    let mut session = HeadlessSession::new(store).await?;

    println!("=== D&D 4E Character Manager ===");
    println!("Characters: {}", session.repository.characters().len());
    println!("Type #help for commands.");
    println!();

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("Error reading input: {e}");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if !line.starts_with('#') {
            println!("[ERROR] Commands start with #. Type #help for help.");
            continue;
        }

        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(message) => {
                println!("[ERROR] {message}");
                continue;
            }
        };
        let quit = command == Command::Quit;

        match session.execute(command).await {
            Ok(lines) => {
                for l in lines {
                    println!("{l}");
                }
            }
            Err(e) => println!("[ERROR] {e}"),
        }
        stdout.flush().ok();

        if quit {
            break;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(Command::parse("#new"), Ok(Command::New));
        assert_eq!(Command::parse("#exit"), Ok(Command::Quit));
        assert_eq!(Command::parse("#phase 4"), Ok(Command::Phase(4)));
        assert!(Command::parse("#phase four").is_err());
        assert!(Command::parse("#dance").is_err());
        assert!(Command::parse("new").is_err());
    }

    #[test]
    fn test_parse_set_patch() {
        let command = Command::parse(r#"#set {"race": "Elf", "level": 2}"#).unwrap();
        assert_eq!(command, Command::Set(CharacterPatch::new().race("Elf").level(2)));

        assert!(Command::parse(r#"#set {"id": "x"}"#).is_err());
        assert!(Command::parse("#set").is_err());
    }

    #[test]
    fn test_parse_ids() {
        let id = CharacterId::new();
        assert_eq!(
            Command::parse(&format!("#resume {id}")),
            Ok(Command::Resume(id))
        );
        assert!(Command::parse("#delete").is_err());
        assert!(Command::parse("#select not-an-id").is_err());
    }

    #[tokio::test]
    async fn test_session_wizard_flow() {
        let store = Store::open_in_memory().await.unwrap();
        let mut session = HeadlessSession::new(store).await.unwrap();

        assert_eq!(session.execute(Command::Finalize).await.unwrap(), no_draft());

        session.execute(Command::New).await.unwrap();
        assert!(session.current_draft().is_some());

        let out = session.execute(Command::Next).await.unwrap();
        assert_eq!(out, vec![format!("[STEP] {}", WizardStep::Class)]);

        session
            .execute(Command::Set(CharacterPatch::new().name("Thorin")))
            .await
            .unwrap();
        let out = session.execute(Command::Points).await.unwrap();
        assert!(out[0].contains("Houseruled"));

        let out = session.execute(Command::Finalize).await.unwrap();
        assert!(out[0].contains("Thorin"));
        assert!(session.current_draft().is_none());

        let out = session.execute(Command::List).await.unwrap();
        assert_eq!(out.len(), 1);
        assert!(out[0].starts_with("[CHARACTER]*"));
    }
}
