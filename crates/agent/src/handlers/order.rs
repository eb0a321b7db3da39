use std::sync::Arc;

use tracing::{debug, info, warn};

use mostrador_core::domain::conversation::OrderSession;
use mostrador_core::domain::order::{OrderDraft, OrderSummary, PlacedOrder};
use mostrador_core::domain::product::{Product, ProductId};
use mostrador_core::errors::ApplicationError;
use mostrador_core::flows::{
    FlowEngine, FlowTransitionError, OrderAction, OrderContext, OrderEvent, OrderFlow, OrderState,
};
use mostrador_core::gate::{check_stock, tenant_open_status, OpenStatus, StockCheck};
use mostrador_db::{CatalogRepository, RepositoryError};

use crate::classifier::{is_cancellation, is_closure, is_confirmation, is_rejection};
use crate::extraction::{
    mentioned_category, mentions_catalog, products_in_category, LineAction, LineRequest,
    OrderExtractor, ADD_VERBS, REMOVE_VERBS,
};
use crate::handlers::{HandlerOutcome, TurnContext};
use crate::phrases;
use crate::response::Reply;
use crate::text::{contains_any, has_quantity, normalize};

/// Which piece of fixed copy closes the turn.
#[derive(Clone, Debug)]
enum OrderReply {
    Updated,
    AskForItems,
    Clarify,
    Modify,
    Confirm,
    Reprompt,
    Placed(PlacedOrder),
    Cancelled,
    EmptyDraft,
    NothingPending,
}

/// Events derived from one utterance, applied in order, plus the line changes they carry.
#[derive(Debug, Default)]
struct OrderPlan {
    events: Vec<OrderEvent>,
    requests: Vec<LineRequest>,
    notices: Vec<String>,
    corrections: Vec<StockCorrection>,
}

/// A draft line that no longer fits the stock on hand. `keep` is the quantity the line
/// is cut down to; zero drops it.
#[derive(Debug)]
struct StockCorrection {
    product_id: ProductId,
    keep: u32,
    notice: String,
}

impl OrderPlan {
    fn single(event: OrderEvent) -> Self {
        Self { events: vec![event], ..Self::default() }
    }

    /// Anything that starts, grows, closes or places an order needs the store to be open.
    fn needs_open_business(&self) -> bool {
        self.events.iter().any(|event| {
            matches!(
                event,
                OrderEvent::StartRequested
                    | OrderEvent::ItemsChanged
                    | OrderEvent::ClosureSignalled
                    | OrderEvent::Affirmed
            )
        })
    }
}

/// Drives the per-conversation draft through the order flow. All replies are built from
/// fixed copy so totals and line items are never produced by the model.
pub struct OrderHandler {
    extractor: OrderExtractor,
    catalog: Arc<dyn CatalogRepository>,
    flow: FlowEngine<OrderFlow>,
}

impl OrderHandler {
    pub fn new(extractor: OrderExtractor, catalog: Arc<dyn CatalogRepository>) -> Self {
        Self { extractor, catalog, flow: FlowEngine::default() }
    }

    pub async fn handle(&self, ctx: &TurnContext<'_>) -> Result<HandlerOutcome, ApplicationError> {
        let mut metadata = ctx.conversation.metadata.clone();
        let session = metadata.order.clone();
        let mut state = session.state();
        let mut draft = session.draft().cloned().unwrap_or_default();
        let text = normalize(ctx.utterance);

        let plan = self.plan(ctx, &session, &text).await?;
        debug!(
            event_name = "order.plan",
            conversation_id = %ctx.conversation.id,
            state = ?state,
            events = ?plan.events,
            lines = plan.requests.len(),
            "order events derived"
        );

        if plan.needs_open_business() {
            let status = tenant_open_status(ctx.tenant, ctx.now);
            if let OpenStatus::Closed { hours_today, .. } = status {
                info!(
                    event_name = "order.closed_hours",
                    tenant_id = %ctx.tenant.id,
                    conversation_id = %ctx.conversation.id,
                    "order change refused outside business hours"
                );
                let text = phrases::closed_notice(
                    &ctx.tenant.voice.display_name,
                    &hours_today,
                    ctx.locale,
                );
                return Ok(HandlerOutcome {
                    requires_confirmation: state == OrderState::PendingConfirmation,
                    ..HandlerOutcome::reply_only(Reply::Deterministic(text), metadata)
                });
            }
        }

        for correction in &plan.corrections {
            if let Err(error) = draft.set_quantity(&correction.product_id, correction.keep) {
                warn!(
                    event_name = "order.correction_skipped",
                    conversation_id = %ctx.conversation.id,
                    product_id = %correction.product_id,
                    error = %error,
                    "stock correction did not match a draft line"
                );
            }
        }

        let mut notices = plan.notices;
        let mut reply = None;
        for event in &plan.events {
            let context = OrderContext { line_count: draft.len() };
            let outcome = match self.flow.apply(&state, event, &context) {
                Ok(outcome) => outcome,
                Err(FlowTransitionError::EmptyDraft { .. }) => {
                    reply = Some(OrderReply::EmptyDraft);
                    break;
                }
                Err(error @ FlowTransitionError::InvalidTransition { .. }) => {
                    debug!(event_name = "order.transition_ignored", error = %error, "no-op event");
                    reply = Some(match (&state, event) {
                        (OrderState::NoDraft, OrderEvent::ModifyRequested)
                        | (OrderState::NoDraft, OrderEvent::Unrecognized) => {
                            OrderReply::AskForItems
                        }
                        (OrderState::NoDraft, _) => OrderReply::NothingPending,
                        _ => OrderReply::Updated,
                    });
                    break;
                }
            };

            for action in &outcome.actions {
                match action {
                    OrderAction::InitializeDraft => draft = OrderDraft::new(),
                    OrderAction::ApplyLineChanges if plan.requests.is_empty() => {
                        reply = Some(OrderReply::AskForItems);
                    }
                    OrderAction::ApplyLineChanges => {
                        self.apply_line_changes(ctx, &mut draft, &plan.requests, &mut notices)
                            .await?;
                        reply = Some(OrderReply::Updated);
                    }
                    OrderAction::AskForItems => {
                        reply = Some(match event {
                            OrderEvent::ModifyRequested => OrderReply::Modify,
                            _ => OrderReply::Clarify,
                        });
                    }
                    OrderAction::PromptConfirmation => reply = Some(OrderReply::Confirm),
                    OrderAction::RepromptConfirmation => reply = Some(OrderReply::Reprompt),
                    OrderAction::PlaceOrder => {
                        let order = PlacedOrder::from_draft(
                            ctx.tenant.id.clone(),
                            ctx.conversation.id.clone(),
                            &draft,
                            ctx.now,
                        );
                        info!(
                            event_name = "order.placed",
                            tenant_id = %ctx.tenant.id,
                            conversation_id = %ctx.conversation.id,
                            order_id = %order.id,
                            lines = order.lines.len(),
                            total = %order.total,
                            "order placed from confirmed draft"
                        );
                        reply = Some(OrderReply::Placed(order));
                    }
                    OrderAction::ClearDraft => {}
                }
            }
            if outcome.to == OrderState::Cancelled {
                reply = Some(OrderReply::Cancelled);
            }
            state = outcome.to;
        }

        let reply = reply.unwrap_or(OrderReply::Clarify);
        let text = self.render(&reply, &draft, &notices, ctx);
        let placed = match reply {
            OrderReply::Placed(order) => Some(order),
            _ => None,
        };
        let order_summary = match (&placed, &state) {
            (Some(order), _) => {
                Some(OrderSummary { line_items: order.lines.clone(), total: order.total })
            }
            (None, OrderState::Drafting | OrderState::PendingConfirmation) if !draft.is_empty() => {
                Some(draft.summary())
            }
            _ => None,
        };

        metadata.order = OrderSession::settle(&state, draft);
        if let Some(order) = &placed {
            metadata.last_order_id = Some(order.id.clone());
        }

        Ok(HandlerOutcome {
            reply: Reply::Deterministic(text),
            metadata,
            order: placed,
            review: None,
            requires_confirmation: state == OrderState::PendingConfirmation,
            order_summary,
            grounded: None,
        })
    }

    async fn plan(
        &self,
        ctx: &TurnContext<'_>,
        session: &OrderSession,
        text: &str,
    ) -> Result<OrderPlan, ApplicationError> {
        let state = session.state();
        if is_cancellation(text) {
            return Ok(OrderPlan::single(OrderEvent::CancelRequested));
        }

        let rejection = is_rejection(text);
        let confirmation = is_confirmation(text) && !rejection;
        let closure = is_closure(text);
        let control_only = (confirmation || rejection || closure)
            && !has_quantity(text)
            && !mentions_catalog(text, ctx.catalog)
            && !contains_any(text, ADD_VERBS)
            && !contains_any(text, REMOVE_VERBS);

        if control_only && confirmation && state == OrderState::PendingConfirmation {
            if let Some(draft) = session.draft() {
                let corrections = self.stock_corrections(ctx, draft).await?;
                if !corrections.is_empty() {
                    let notices = corrections.iter().map(|fix| fix.notice.clone()).collect();
                    return Ok(OrderPlan {
                        events: vec![OrderEvent::ModifyRequested],
                        requests: Vec::new(),
                        notices,
                        corrections,
                    });
                }
            }
            return Ok(OrderPlan::single(OrderEvent::Affirmed));
        }

        let requests = if control_only {
            Vec::new()
        } else {
            self.extractor
                .extract(
                    ctx.utterance,
                    ctx.catalog,
                    session.draft(),
                    &ctx.tenant.voice,
                    ctx.locale,
                )
                .await
                .requests
        };

        let mut events = Vec::new();
        if !requests.is_empty() {
            events.push(if state == OrderState::NoDraft {
                OrderEvent::StartRequested
            } else {
                OrderEvent::ItemsChanged
            });
        }
        if closure {
            events.push(OrderEvent::ClosureSignalled);
        } else if requests.is_empty() {
            // Pending drafts are only placed by a bare confirmation.
            events.push(if confirmation && state != OrderState::PendingConfirmation {
                OrderEvent::Affirmed
            } else if rejection {
                OrderEvent::ModifyRequested
            } else if state == OrderState::NoDraft {
                OrderEvent::StartRequested
            } else {
                OrderEvent::Unrecognized
            });
        }

        Ok(OrderPlan { events, requests, ..OrderPlan::default() })
    }

    /// Applies extracted line changes one by one. Stock is checked against the quantity
    /// the draft would hold afterwards; refused lines leave the draft untouched and add a
    /// notice instead.
    async fn apply_line_changes(
        &self,
        ctx: &TurnContext<'_>,
        draft: &mut OrderDraft,
        requests: &[LineRequest],
        notices: &mut Vec<String>,
    ) -> Result<(), ApplicationError> {
        for request in requests {
            let Some(product) = ctx.catalog.iter().find(|product| product.id == request.product_id)
            else {
                continue;
            };
            let held = draft.quantity_of(&product.id);

            let result = match request.action {
                LineAction::Remove if held == 0 => {
                    notices.push(phrases::not_in_order(&product.name, ctx.locale));
                    continue;
                }
                LineAction::Remove => draft.remove(&product.id, request.quantity).map(|_| ()),
                LineAction::Add | LineAction::Set => {
                    let quantity = request.quantity.unwrap_or(1);
                    let wanted = match request.action {
                        LineAction::Add => held.saturating_add(quantity),
                        _ => quantity,
                    };
                    let check = self.stock_check(ctx, product, wanted).await?;
                    if !check.is_available() {
                        notices.push(phrases::stock_rejection(&product.name, check, ctx.locale));
                        continue;
                    }
                    if request.action == LineAction::Set && held > 0 {
                        draft.set_quantity(&product.id, quantity).map(|_| ())
                    } else {
                        draft.add(product, quantity).map(|_| ())
                    }
                }
            };

            if let Err(error) = result {
                warn!(
                    event_name = "order.line_rejected",
                    conversation_id = %ctx.conversation.id,
                    product_id = %product.id,
                    error = %error,
                    "draft refused line change"
                );
            }
        }
        Ok(())
    }

    /// Re-checks every draft line right before placement. Products that left the active
    /// catalog count as sold out.
    async fn stock_corrections(
        &self,
        ctx: &TurnContext<'_>,
        draft: &OrderDraft,
    ) -> Result<Vec<StockCorrection>, ApplicationError> {
        let mut corrections = Vec::new();
        for line in draft.lines() {
            let check = match ctx.catalog.iter().find(|product| product.id == line.product_id) {
                Some(product) => self.stock_check(ctx, product, line.quantity).await?,
                None => StockCheck::OutOfStock,
            };
            let (keep, notice) = match check {
                StockCheck::Available => continue,
                StockCheck::Insufficient { available } => (
                    available,
                    phrases::stock_adjusted(&line.product_name, available, ctx.locale),
                ),
                StockCheck::OutOfStock => {
                    (0, phrases::stock_rejection(&line.product_name, check, ctx.locale))
                }
            };
            corrections.push(StockCorrection { product_id: line.product_id.clone(), keep, notice });
        }
        Ok(corrections)
    }

    async fn stock_check(
        &self,
        ctx: &TurnContext<'_>,
        product: &Product,
        wanted: u32,
    ) -> Result<StockCheck, ApplicationError> {
        let available =
            self.catalog.stock_level(&ctx.tenant.id, &product.id).await.map_err(persistence)?;
        Ok(check_stock(available, wanted))
    }

    fn render(
        &self,
        reply: &OrderReply,
        draft: &OrderDraft,
        notices: &[String],
        ctx: &TurnContext<'_>,
    ) -> String {
        let locale = ctx.locale;
        let summary = draft.summary();
        let body = match reply {
            OrderReply::Updated => return phrases::draft_updated(&summary, notices, locale),
            OrderReply::AskForItems => phrases::ask_for_items(ctx.catalog, locale),
            OrderReply::Clarify => {
                let text = normalize(ctx.utterance);
                let subset: Vec<Product> = match mentioned_category(&text, ctx.catalog) {
                    Some(category) => products_in_category(ctx.catalog, &category)
                        .into_iter()
                        .cloned()
                        .collect(),
                    None => ctx.catalog.to_vec(),
                };
                if subset.is_empty() {
                    phrases::ask_for_items(&subset, locale)
                } else {
                    phrases::clarify_items(&subset, locale)
                }
            }
            OrderReply::Modify if draft.is_empty() => phrases::ask_for_items(ctx.catalog, locale),
            OrderReply::Modify => phrases::modify_prompt(&summary, locale),
            OrderReply::Confirm => phrases::confirmation_prompt(&summary, locale),
            OrderReply::Reprompt => phrases::reprompt_confirmation(&summary, locale),
            OrderReply::Placed(order) => phrases::order_placed(order, locale),
            OrderReply::Cancelled => phrases::order_cancelled(locale),
            OrderReply::EmptyDraft => phrases::empty_draft(locale),
            OrderReply::NothingPending => phrases::nothing_pending(locale),
        };

        if notices.is_empty() {
            body
        } else {
            format!("{}\n\n{body}", notices.join("\n"))
        }
    }
}

fn persistence(error: RepositoryError) -> ApplicationError {
    ApplicationError::Persistence(error.to_string())
}
