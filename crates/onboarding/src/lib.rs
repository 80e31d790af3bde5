//! Multi-step configuration flow for bring-your-own-key providers.
//!
//! Flow: provider → models → (model id | deployment URL → discovered model)
//! → advanced settings → display name → token limits → tool calling → vision
//! → complete. Every prompt offers a way back; dismissing any prompt ends the
//! run without a result.

pub mod engine;
pub mod error;
pub mod recovery;
pub mod result;
pub mod state;
pub mod steps;
pub mod surface;
pub mod terminal;

#[cfg(test)]
mod test_support;

pub use {
    engine::ConfigurationFlow,
    error::{Error, Result},
    recovery::ErrorCategory,
    result::{CustomModel, FlowResult},
    state::{ConfigurationStep, FlowState, StepOutcome, previous_step_for},
    surface::{
        ErrorModal, InputOptions, ItemButton, ModalAction, PickItem, PickOptions, PickResponse,
        PromptResponse, PromptSurface,
    },
    terminal::TerminalSurface,
};
