use thiserror::Error;

use crate::flows::states::{OrderAction, OrderContext, OrderEvent, OrderState, TransitionOutcome};

pub trait FlowDefinition {
    fn initial_state(&self) -> OrderState;
    fn transition(
        &self,
        current: &OrderState,
        event: &OrderEvent,
        context: &OrderContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>;
}

#[derive(Clone, Debug, Default)]
pub struct OrderFlow;

impl FlowDefinition for OrderFlow {
    fn initial_state(&self) -> OrderState {
        OrderState::NoDraft
    }

    fn transition(
        &self,
        current: &OrderState,
        event: &OrderEvent,
        context: &OrderContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_order(current, event, context)
    }
}

pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn initial_state(&self) -> OrderState {
        self.flow.initial_state()
    }

    pub fn apply(
        &self,
        current: &OrderState,
        event: &OrderEvent,
        context: &OrderContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        let result = self.flow.transition(current, event, context);
        match &result {
            Ok(outcome) => tracing::debug!(
                event_name = "flow.transition_applied",
                from = ?outcome.from,
                to = ?outcome.to,
                event = ?outcome.event,
                "order flow transition applied"
            ),
            Err(error) => tracing::debug!(
                event_name = "flow.transition_rejected",
                error = %error,
                "order flow transition rejected"
            ),
        }
        result
    }
}

impl Default for FlowEngine<OrderFlow> {
    fn default() -> Self {
        Self::new(OrderFlow)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("draft has no line items to confirm in state {state:?}")]
    EmptyDraft { state: OrderState },
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: OrderState, event: OrderEvent },
}

fn transition_order(
    current: &OrderState,
    event: &OrderEvent,
    context: &OrderContext,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use OrderAction::{
        ApplyLineChanges, AskForItems, ClearDraft, InitializeDraft, PlaceOrder,
        PromptConfirmation, RepromptConfirmation,
    };
    use OrderEvent::{
        Affirmed, CancelRequested, ClosureSignalled, ItemsChanged, ModifyRequested,
        StartRequested, Unrecognized,
    };
    use OrderState::{Cancelled, Confirmed, Drafting, NoDraft, PendingConfirmation};

    let (to, actions) = match (current, event) {
        (NoDraft, StartRequested) | (Confirmed, StartRequested) | (Cancelled, StartRequested) => {
            (Drafting, vec![InitializeDraft, ApplyLineChanges])
        }
        (Drafting, StartRequested) | (Drafting, ItemsChanged) => {
            (Drafting, vec![ApplyLineChanges])
        }
        (Drafting, ModifyRequested) | (Drafting, Unrecognized) => (Drafting, vec![AskForItems]),
        (Drafting, ClosureSignalled) => {
            if context.line_count == 0 {
                return Err(FlowTransitionError::EmptyDraft { state: current.clone() });
            }
            (PendingConfirmation, vec![PromptConfirmation])
        }
        (PendingConfirmation, Affirmed) => (Confirmed, vec![PlaceOrder, ClearDraft]),
        (PendingConfirmation, ModifyRequested) => (Drafting, vec![AskForItems]),
        (PendingConfirmation, StartRequested) | (PendingConfirmation, ItemsChanged) => {
            (Drafting, vec![ApplyLineChanges])
        }
        (PendingConfirmation, ClosureSignalled) | (PendingConfirmation, Unrecognized) => {
            (PendingConfirmation, vec![RepromptConfirmation])
        }
        (Drafting, CancelRequested) | (PendingConfirmation, CancelRequested) => {
            (Cancelled, vec![ClearDraft])
        }
        _ => {
            return Err(FlowTransitionError::InvalidTransition {
                state: current.clone(),
                event: event.clone(),
            });
        }
    };

    Ok(TransitionOutcome { from: current.clone(), to, event: event.clone(), actions })
}

#[cfg(test)]
mod tests {
    use crate::flows::engine::{FlowDefinition, FlowEngine, FlowTransitionError, OrderFlow};
    use crate::flows::states::{OrderAction, OrderContext, OrderEvent, OrderState};

    fn with_lines(line_count: usize) -> OrderContext {
        OrderContext { line_count }
    }

    #[test]
    fn happy_path_reaches_confirmed() {
        let engine = FlowEngine::new(OrderFlow);
        let mut state = engine.initial_state();

        let started = engine
            .apply(&state, &OrderEvent::StartRequested, &with_lines(0))
            .expect("no draft -> drafting");
        assert_eq!(
            started.actions,
            vec![OrderAction::InitializeDraft, OrderAction::ApplyLineChanges]
        );
        state = started.to;

        state = engine
            .apply(&state, &OrderEvent::ItemsChanged, &with_lines(1))
            .expect("drafting -> drafting")
            .to;
        state = engine
            .apply(&state, &OrderEvent::ClosureSignalled, &with_lines(1))
            .expect("drafting -> pending confirmation")
            .to;
        assert_eq!(state, OrderState::PendingConfirmation);

        let confirmed = engine
            .apply(&state, &OrderEvent::Affirmed, &with_lines(1))
            .expect("pending -> confirmed");
        assert_eq!(confirmed.to, OrderState::Confirmed);
        assert!(confirmed.to.is_terminal());
        assert!(confirmed.actions.contains(&OrderAction::PlaceOrder));
    }

    #[test]
    fn confirmation_only_from_pending() {
        let engine = FlowEngine::default();
        for state in [OrderState::NoDraft, OrderState::Drafting, OrderState::Confirmed] {
            let error = engine
                .apply(&state, &OrderEvent::Affirmed, &with_lines(2))
                .expect_err("affirmation outside pending confirmation");
            assert!(matches!(error, FlowTransitionError::InvalidTransition { .. }));
        }
    }

    #[test]
    fn closure_with_empty_draft_is_rejected() {
        let engine = FlowEngine::default();
        let error = engine
            .apply(&OrderState::Drafting, &OrderEvent::ClosureSignalled, &with_lines(0))
            .expect_err("empty draft cannot be confirmed");
        assert_eq!(error, FlowTransitionError::EmptyDraft { state: OrderState::Drafting });
    }

    #[test]
    fn pending_returns_to_drafting_on_modification() {
        let engine = FlowEngine::default();
        let modified = engine
            .apply(&OrderState::PendingConfirmation, &OrderEvent::ModifyRequested, &with_lines(1))
            .expect("pending -> drafting");
        assert_eq!(modified.to, OrderState::Drafting);

        let changed = engine
            .apply(&OrderState::PendingConfirmation, &OrderEvent::ItemsChanged, &with_lines(1))
            .expect("pending -> drafting with changes");
        assert_eq!(changed.to, OrderState::Drafting);
        assert_eq!(changed.actions, vec![OrderAction::ApplyLineChanges]);
    }

    #[test]
    fn unrelated_reply_while_pending_reprompts_without_state_change() {
        let engine = FlowEngine::default();
        let outcome = engine
            .apply(&OrderState::PendingConfirmation, &OrderEvent::Unrecognized, &with_lines(1))
            .expect("reprompt");
        assert_eq!(outcome.to, OrderState::PendingConfirmation);
        assert_eq!(outcome.actions, vec![OrderAction::RepromptConfirmation]);
    }

    #[test]
    fn cancel_clears_open_drafts_but_not_missing_ones() {
        let engine = FlowEngine::default();
        for state in [OrderState::Drafting, OrderState::PendingConfirmation] {
            let outcome = engine
                .apply(&state, &OrderEvent::CancelRequested, &with_lines(1))
                .expect("open draft can be cancelled");
            assert_eq!(outcome.to, OrderState::Cancelled);
            assert_eq!(outcome.actions, vec![OrderAction::ClearDraft]);
        }

        assert!(engine
            .apply(&OrderState::NoDraft, &OrderEvent::CancelRequested, &with_lines(0))
            .is_err());
    }

    #[test]
    fn terminal_states_can_start_a_new_order() {
        let engine = FlowEngine::default();
        for state in [OrderState::Confirmed, OrderState::Cancelled] {
            let outcome = engine
                .apply(&state, &OrderEvent::StartRequested, &with_lines(0))
                .expect("terminal -> drafting");
            assert_eq!(outcome.to, OrderState::Drafting);
        }
    }

    #[test]
    fn replay_is_deterministic_for_same_event_sequence() {
        let engine = FlowEngine::default();
        let events = [
            (OrderEvent::StartRequested, 1),
            (OrderEvent::ItemsChanged, 2),
            (OrderEvent::ClosureSignalled, 2),
            (OrderEvent::Unrecognized, 2),
            (OrderEvent::Affirmed, 2),
        ];

        let run = |engine: &FlowEngine<OrderFlow>| {
            let mut state = engine.initial_state();
            let mut actions = Vec::new();
            for (event, lines) in &events {
                let outcome =
                    engine.apply(&state, event, &with_lines(*lines)).expect("deterministic run");
                actions.push(outcome.actions);
                state = outcome.to;
            }
            (state, actions)
        };

        let first = run(&engine);
        let second = run(&engine);

        assert_eq!(first, second);
        assert_eq!(first.0, OrderState::Confirmed);
        assert_eq!(OrderFlow.initial_state(), OrderState::NoDraft);
    }
}
