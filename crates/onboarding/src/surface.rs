//! Contracts for the host UI: a free-text prompt, a choice list, an error
//! modal and a transient notification.

use std::{fmt, sync::Arc};

use async_trait::async_trait;

/// Maps the current input to an inline error message, `None` when valid.
pub type InputValidator = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Free-text prompt configuration.
#[derive(Clone, Default)]
pub struct InputOptions {
    pub title: String,
    pub prompt: String,
    pub placeholder: Option<String>,
    /// Pre-filled value, returned as-is when the user just confirms.
    pub value: Option<String>,
    pub password: bool,
    pub validator: Option<InputValidator>,
}

impl InputOptions {
    pub fn new(title: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn value(mut self, value: Option<String>) -> Self {
        self.value = value;
        self
    }

    pub fn password(mut self) -> Self {
        self.password = true;
        self
    }

    pub fn validate(mut self, validator: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    /// Run the validator, if any.
    pub fn check(&self, input: &str) -> Option<String> {
        self.validator.as_ref().and_then(|v| v(input))
    }
}

impl fmt::Debug for InputOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputOptions")
            .field("title", &self.title)
            .field("prompt", &self.prompt)
            .field("placeholder", &self.placeholder)
            .field(
                "value",
                &if self.password {
                    self.value.as_ref().map(|_| "[REDACTED]".to_string())
                } else {
                    self.value.clone()
                },
            )
            .field("password", &self.password)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

/// Action button attached to a picker item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemButton {
    DeleteModel,
    ReconfigureKey,
}

impl ItemButton {
    pub fn label(self) -> &'static str {
        match self {
            Self::DeleteModel => "Delete model",
            Self::ReconfigureKey => "Reconfigure API key",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickItem {
    pub id: String,
    pub label: String,
    pub description: Option<String>,
    pub picked: bool,
    pub buttons: Vec<ItemButton>,
}

impl PickItem {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: None,
            picked: false,
            buttons: Vec::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn picked(mut self, picked: bool) -> Self {
        self.picked = picked;
        self
    }

    pub fn button(mut self, button: ItemButton) -> Self {
        self.buttons.push(button);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct PickOptions {
    pub title: String,
    pub placeholder: Option<String>,
    pub items: Vec<PickItem>,
    pub can_pick_many: bool,
    pub show_back_button: bool,
}

impl PickOptions {
    pub fn new(title: impl Into<String>, items: Vec<PickItem>) -> Self {
        Self {
            title: title.into(),
            items,
            ..Self::default()
        }
    }

    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn many(mut self) -> Self {
        self.can_pick_many = true;
        self
    }

    pub fn with_back(mut self) -> Self {
        self.show_back_button = true;
        self
    }

    pub fn preselected(&self) -> Vec<String> {
        self.items
            .iter()
            .filter(|i| i.picked)
            .map(|i| i.id.clone())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptResponse<T> {
    Value(T),
    Back,
    Dismissed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickResponse {
    Accepted(Vec<String>),
    /// An item button resolved the picker without a normal accept.
    ItemButton { id: String, button: ItemButton },
    Back,
    Dismissed,
}

/// Error modal offered by the recovery wrapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorModal {
    pub title: String,
    pub message: String,
    pub primary_label: String,
    pub back_label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModalAction {
    /// Re-enter the step that failed.
    Primary,
    GoBack,
}

/// Host UI capabilities injected into the flow.
#[async_trait]
pub trait PromptSurface: Send {
    async fn input(&mut self, options: InputOptions) -> PromptResponse<String>;

    async fn pick(&mut self, options: PickOptions) -> PickResponse;

    /// `None` means the modal was dismissed.
    async fn show_error(&mut self, modal: ErrorModal) -> Option<ModalAction>;

    async fn notify(&mut self, message: &str);
}
