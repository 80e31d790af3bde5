//! Line-based prompt surface for terminals.
//!
//! Commands accepted at any prompt: `:back` goes back, `:q` (or end of input)
//! dismisses. Pickers take item numbers (`1,3` when several may be picked)
//! and item actions as `d<n>` (delete model) or `k<n>` (reconfigure key).
//! An empty line accepts the pre-filled value or the pre-selection.

use std::io::{self, BufRead, BufReader, Stdin, Stdout, Write};

use {async_trait::async_trait, tracing::warn};

use crate::surface::{
    ErrorModal, InputOptions, ItemButton, ModalAction, PickOptions, PickResponse,
    PromptResponse, PromptSurface,
};

const BACK: &str = ":back";
const QUIT: &str = ":q";

pub struct TerminalSurface<R, W> {
    reader: R,
    writer: W,
}

impl TerminalSurface<BufReader<Stdin>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(io::stdin()), io::stdout())
    }
}

enum Line {
    Text(String),
    Back,
    Quit,
}

impl<R: BufRead, W: Write> TerminalSurface<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    pub fn into_parts(self) -> (R, W) {
        (self.reader, self.writer)
    }

    fn read_line(&mut self, cue: &str) -> io::Result<Line> {
        write!(self.writer, "{cue} ")?;
        self.writer.flush()?;
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(Line::Quit);
        }
        let line = line.trim_end_matches(['\r', '\n']);
        Ok(match line.trim() {
            BACK => Line::Back,
            QUIT => Line::Quit,
            _ => Line::Text(line.to_string()),
        })
    }

    fn run_input(&mut self, options: &InputOptions) -> io::Result<PromptResponse<String>> {
        writeln!(self.writer, "\n{}", options.title)?;
        writeln!(self.writer, "{}", options.prompt)?;
        if options.password {
            writeln!(self.writer, "(input is shown while typing)")?;
        }
        let cue = match (&options.value, &options.placeholder) {
            (Some(_), _) if options.password => "[keep current] >".to_string(),
            (Some(value), _) => format!("[{value}] >"),
            (None, Some(placeholder)) => format!("({placeholder}) >"),
            (None, None) => ">".to_string(),
        };

        loop {
            let text = match self.read_line(&cue)? {
                Line::Text(text) => text,
                Line::Back => return Ok(PromptResponse::Back),
                Line::Quit => return Ok(PromptResponse::Dismissed),
            };
            let value = match &options.value {
                Some(default) if text.trim().is_empty() => default.clone(),
                _ => text,
            };
            match options.check(&value) {
                Some(error) => writeln!(self.writer, "  ! {error}")?,
                None => return Ok(PromptResponse::Value(value)),
            }
        }
    }

    fn run_pick(&mut self, options: &PickOptions) -> io::Result<PickResponse> {
        writeln!(self.writer, "\n{}", options.title)?;
        if let Some(placeholder) = &options.placeholder {
            writeln!(self.writer, "{placeholder}")?;
        }
        for (index, item) in options.items.iter().enumerate() {
            let mark = if item.picked { "x" } else { " " };
            write!(self.writer, "  {:>2}. [{mark}] {}", index + 1, item.label)?;
            if let Some(description) = &item.description {
                write!(self.writer, "  ({description})")?;
            }
            for button in &item.buttons {
                write!(self.writer, "  [{}{}: {}]", button_key(*button), index + 1, button.label())?;
            }
            writeln!(self.writer)?;
        }
        let cue = if options.can_pick_many {
            "numbers, comma separated >"
        } else {
            "number >"
        };

        loop {
            let text = match self.read_line(cue)? {
                Line::Text(text) => text,
                Line::Back if options.show_back_button => return Ok(PickResponse::Back),
                Line::Back => {
                    writeln!(self.writer, "  ! there is no previous step")?;
                    continue;
                },
                Line::Quit => return Ok(PickResponse::Dismissed),
            };
            match parse_pick(&text, options) {
                Ok(response) => return Ok(response),
                Err(message) => writeln!(self.writer, "  ! {message}")?,
            }
        }
    }

    fn run_error(&mut self, modal: &ErrorModal) -> io::Result<Option<ModalAction>> {
        writeln!(self.writer, "\n{}", modal.title)?;
        writeln!(self.writer, "{}", modal.message)?;
        writeln!(self.writer, "  1. {}", modal.primary_label)?;
        writeln!(self.writer, "  2. {}", modal.back_label)?;
        loop {
            let text = match self.read_line("[1] >")? {
                Line::Text(text) => text,
                Line::Back => return Ok(Some(ModalAction::GoBack)),
                Line::Quit => return Ok(None),
            };
            match text.trim() {
                "" | "1" => return Ok(Some(ModalAction::Primary)),
                "2" => return Ok(Some(ModalAction::GoBack)),
                _ => writeln!(self.writer, "  ! choose 1 or 2")?,
            }
        }
    }
}

fn button_key(button: ItemButton) -> char {
    match button {
        ItemButton::DeleteModel => 'd',
        ItemButton::ReconfigureKey => 'k',
    }
}

fn parse_pick(text: &str, options: &PickOptions) -> Result<PickResponse, String> {
    let text = text.trim();
    let item_at = |raw: &str| -> Result<usize, String> {
        raw.trim()
            .parse::<usize>()
            .ok()
            .filter(|n| (1..=options.items.len()).contains(n))
            .map(|n| n - 1)
            .ok_or_else(|| format!("{raw:?} is not an item number"))
    };

    if text.is_empty() {
        let preselected = options.preselected();
        if preselected.is_empty() && !options.can_pick_many {
            return Err("pick one item".to_string());
        }
        return Ok(PickResponse::Accepted(preselected));
    }

    for button in [ItemButton::DeleteModel, ItemButton::ReconfigureKey] {
        if let Some(rest) = text.strip_prefix(button_key(button)) {
            let item = &options.items[item_at(rest)?];
            if !item.buttons.contains(&button) {
                return Err(format!("{} is not available for {}", button.label(), item.label));
            }
            return Ok(PickResponse::ItemButton {
                id: item.id.clone(),
                button,
            });
        }
    }

    let indices = text
        .split([',', ' '])
        .filter(|s| !s.is_empty())
        .map(item_at)
        .collect::<Result<Vec<_>, _>>()?;
    if !options.can_pick_many && indices.len() != 1 {
        return Err("pick exactly one item".to_string());
    }
    let mut ids: Vec<String> = Vec::with_capacity(indices.len());
    for index in indices {
        let id = &options.items[index].id;
        if !ids.contains(id) {
            ids.push(id.clone());
        }
    }
    Ok(PickResponse::Accepted(ids))
}

#[async_trait]
impl<R, W> PromptSurface for TerminalSurface<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    async fn input(&mut self, options: InputOptions) -> PromptResponse<String> {
        self.run_input(&options).unwrap_or_else(|error| {
            warn!(error = %error, "terminal input failed");
            PromptResponse::Dismissed
        })
    }

    async fn pick(&mut self, options: PickOptions) -> PickResponse {
        self.run_pick(&options).unwrap_or_else(|error| {
            warn!(error = %error, "terminal input failed");
            PickResponse::Dismissed
        })
    }

    async fn show_error(&mut self, modal: ErrorModal) -> Option<ModalAction> {
        self.run_error(&modal).unwrap_or_else(|error| {
            warn!(error = %error, "terminal input failed");
            None
        })
    }

    async fn notify(&mut self, message: &str) {
        if let Err(error) = writeln!(self.writer, "{message}") {
            warn!(error = %error, "terminal output failed");
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use {super::*, crate::surface::PickItem};

    fn surface(input: &str) -> TerminalSurface<Cursor<Vec<u8>>, Vec<u8>> {
        TerminalSurface::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    fn output(surface: TerminalSurface<Cursor<Vec<u8>>, Vec<u8>>) -> String {
        String::from_utf8(surface.into_parts().1).unwrap()
    }

    fn models() -> PickOptions {
        PickOptions::new("Select models", vec![
            PickItem::new("gpt-4o", "GPT-4o").picked(true),
            PickItem::new("o3", "o3"),
            PickItem::new("custom", "custom").button(ItemButton::DeleteModel),
        ])
        .many()
        .with_back()
    }

    #[tokio::test]
    async fn input_reprompts_until_valid() {
        let mut s = surface("\nabc\n");
        let options = InputOptions::new("Model ID", "Enter it").validate(|v| {
            if v.is_empty() {
                Some("Model ID cannot be empty".to_string())
            } else {
                None
            }
        });
        assert_eq!(s.input(options).await, PromptResponse::Value("abc".into()));
        assert!(output(s).contains("! Model ID cannot be empty"));
    }

    #[tokio::test]
    async fn empty_input_takes_prefilled_value() {
        let mut s = surface("\n");
        let options = InputOptions::new("URL", "Enter it").value(Some("https://a.example.com/v1".into()));
        assert_eq!(
            s.input(options).await,
            PromptResponse::Value("https://a.example.com/v1".into())
        );
    }

    #[tokio::test]
    async fn back_and_quit_commands() {
        let mut s = surface(":back\n:q\n");
        assert_eq!(
            s.input(InputOptions::new("t", "p")).await,
            PromptResponse::Back
        );
        assert_eq!(
            s.input(InputOptions::new("t", "p")).await,
            PromptResponse::Dismissed
        );
        // End of input dismisses as well.
        assert_eq!(
            s.input(InputOptions::new("t", "p")).await,
            PromptResponse::Dismissed
        );
    }

    #[tokio::test]
    async fn picker_accepts_numbers_and_preselection() {
        let mut s = surface("2, 1\n\n");
        assert_eq!(
            s.pick(models()).await,
            PickResponse::Accepted(vec!["o3".into(), "gpt-4o".into()])
        );
        assert_eq!(
            s.pick(models()).await,
            PickResponse::Accepted(vec!["gpt-4o".into()])
        );
    }

    #[tokio::test]
    async fn picker_item_buttons() {
        let mut s = surface("d2\nd3\n");
        assert_eq!(s.pick(models()).await, PickResponse::ItemButton {
            id: "custom".into(),
            button: ItemButton::DeleteModel,
        });
        assert!(output(s).contains("Delete model is not available for o3"));
    }

    #[tokio::test]
    async fn single_picker_rejects_many() {
        let options = PickOptions::new("Provider", vec![
            PickItem::new("OpenAI", "OpenAI"),
            PickItem::new("Groq", "Groq"),
        ]);
        let mut s = surface("1,2\n9\n:back\n2\n");
        assert_eq!(
            s.pick(options).await,
            PickResponse::Accepted(vec!["Groq".into()])
        );
        let out = output(s);
        assert!(out.contains("pick exactly one item"));
        assert!(out.contains("\"9\" is not an item number"));
        assert!(out.contains("there is no previous step"));
    }

    #[tokio::test]
    async fn error_modal_choices() {
        let modal = ErrorModal {
            title: "Authentication failed".into(),
            message: "invalid API key".into(),
            primary_label: "Re-enter credentials".into(),
            back_label: "Go back".into(),
        };
        let mut s = surface("\n2\n:q\n");
        assert_eq!(s.show_error(modal.clone()).await, Some(ModalAction::Primary));
        assert_eq!(s.show_error(modal.clone()).await, Some(ModalAction::GoBack));
        assert_eq!(s.show_error(modal).await, None);
    }
}
