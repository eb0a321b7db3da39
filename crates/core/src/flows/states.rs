use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderState {
    NoDraft,
    Drafting,
    PendingConfirmation,
    Confirmed,
    Cancelled,
}

impl OrderState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Cancelled)
    }
}

/// What the user's utterance means for the order, as judged by the order handler.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    StartRequested,
    ItemsChanged,
    ClosureSignalled,
    Affirmed,
    ModifyRequested,
    CancelRequested,
    Unrecognized,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct OrderContext {
    pub line_count: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderAction {
    InitializeDraft,
    ApplyLineChanges,
    AskForItems,
    PromptConfirmation,
    RepromptConfirmation,
    PlaceOrder,
    ClearDraft,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: OrderState,
    pub to: OrderState,
    pub event: OrderEvent,
    pub actions: Vec<OrderAction>,
}
