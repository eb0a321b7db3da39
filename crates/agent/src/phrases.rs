//! Fixed customer-facing copy in both supported languages. Anything with an amount in it
//! is built here, never by the model.

use mostrador_core::domain::order::{OrderSummary, PlacedOrder};
use mostrador_core::domain::product::Product;
use mostrador_core::domain::review::Rating;
use mostrador_core::domain::tenant::Locale;
use mostrador_core::gate::StockCheck;

use crate::response::format_money;

const SUGGESTION_COUNT: usize = 4;

pub fn summary_lines(summary: &OrderSummary, locale: Locale) -> String {
    let mut lines: Vec<String> = summary
        .line_items
        .iter()
        .map(|line| {
            format!(
                "- {} x {}: {}",
                line.quantity,
                line.product_name,
                format_money(line.subtotal(), locale)
            )
        })
        .collect();
    lines.push(format!("Total: {}", format_money(summary.total, locale)));
    lines.join("\n")
}

pub fn draft_updated(summary: &OrderSummary, rejections: &[String], locale: Locale) -> String {
    let mut parts = Vec::new();
    if !rejections.is_empty() {
        parts.push(rejections.join("\n"));
    }
    if summary.line_items.is_empty() {
        parts.push(empty_draft(locale));
        return parts.join("\n\n");
    }

    let (header, footer) = match locale {
        Locale::Es => (
            "Tu pedido actual:",
            "¿Algo más? Cuando termines, escribe \"eso es todo\".",
        ),
        Locale::En => {
            ("Your current order:", "Anything else? When you're done, say \"that's all\".")
        }
    };
    parts.push(format!("{header}\n{}", summary_lines(summary, locale)));
    parts.push(footer.to_owned());
    parts.join("\n\n")
}

pub fn confirmation_prompt(summary: &OrderSummary, locale: Locale) -> String {
    match locale {
        Locale::Es => format!(
            "Este es tu pedido:\n{}\n\n¿Confirmas el pedido? Responde \"sí\" para confirmar o dime qué quieres cambiar.",
            summary_lines(summary, locale)
        ),
        Locale::En => format!(
            "Here is your order:\n{}\n\nShall I place it? Reply \"yes\" to confirm or tell me what to change.",
            summary_lines(summary, locale)
        ),
    }
}

pub fn reprompt_confirmation(summary: &OrderSummary, locale: Locale) -> String {
    let total = format_money(summary.total, locale);
    match locale {
        Locale::Es => format!(
            "Tu pedido ({total}) está esperando confirmación. Responde \"sí\" para confirmar, \"cambiar\" para modificarlo o \"cancelar\" para anularlo."
        ),
        Locale::En => format!(
            "Your order ({total}) is waiting for confirmation. Reply \"yes\" to confirm, \"change\" to modify it or \"cancel\" to drop it."
        ),
    }
}

pub fn modify_prompt(summary: &OrderSummary, locale: Locale) -> String {
    match locale {
        Locale::Es => format!(
            "Claro, dime qué quieres agregar, quitar o cambiar.\n{}",
            summary_lines(summary, locale)
        ),
        Locale::En => format!(
            "Sure, tell me what to add, remove or change.\n{}",
            summary_lines(summary, locale)
        ),
    }
}

pub fn order_placed(order: &PlacedOrder, locale: Locale) -> String {
    let reference: String = order.id.0.chars().take(8).collect();
    let summary = OrderSummary { line_items: order.lines.clone(), total: order.total };
    match locale {
        Locale::Es => format!(
            "¡Pedido confirmado! Número de pedido: {reference}\n{}\n\n¡Gracias por tu compra!",
            summary_lines(&summary, locale)
        ),
        Locale::En => format!(
            "Order placed! Order number: {reference}\n{}\n\nThank you for your purchase!",
            summary_lines(&summary, locale)
        ),
    }
}

pub fn order_cancelled(locale: Locale) -> String {
    match locale {
        Locale::Es => "Listo, cancelé tu pedido. Si quieres, podemos empezar uno nuevo.".to_owned(),
        Locale::En => "Done, your order is cancelled. We can start a new one anytime.".to_owned(),
    }
}

pub fn empty_draft(locale: Locale) -> String {
    match locale {
        Locale::Es => "Tu pedido todavía no tiene productos. ¿Qué te gustaría pedir?".to_owned(),
        Locale::En => "Your order has no items yet. What would you like?".to_owned(),
    }
}

pub fn nothing_pending(locale: Locale) -> String {
    match locale {
        Locale::Es => {
            "No tienes un pedido pendiente. Si quieres pedir algo, dime qué productos te gustaría."
                .to_owned()
        }
        Locale::En => {
            "There is no order in progress. Tell me which products you'd like to order.".to_owned()
        }
    }
}

fn suggestions(catalog: &[Product], locale: Locale) -> String {
    catalog
        .iter()
        .take(SUGGESTION_COUNT)
        .map(|product| format!("{} ({})", product.name, format_money(product.price, locale)))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn ask_for_items(catalog: &[Product], locale: Locale) -> String {
    if catalog.is_empty() {
        return match locale {
            Locale::Es => "¿Qué te gustaría pedir?".to_owned(),
            Locale::En => "What would you like to order?".to_owned(),
        };
    }
    match locale {
        Locale::Es => {
            format!("¿Qué te gustaría pedir? Algunas opciones: {}.", suggestions(catalog, locale))
        }
        Locale::En => {
            format!("What would you like to order? Some options: {}.", suggestions(catalog, locale))
        }
    }
}

pub fn clarify_items(catalog: &[Product], locale: Locale) -> String {
    match locale {
        Locale::Es => format!(
            "No logré identificar productos del menú en tu mensaje. Algunas opciones: {}.",
            suggestions(catalog, locale)
        ),
        Locale::En => format!(
            "I couldn't find menu items in your message. Some options: {}.",
            suggestions(catalog, locale)
        ),
    }
}

pub fn stock_rejection(product_name: &str, check: StockCheck, locale: Locale) -> String {
    match (check, locale) {
        (StockCheck::Insufficient { available }, Locale::Es) => {
            format!("Solo quedan {available} unidades de {product_name}, no pude agregar esa cantidad.")
        }
        (StockCheck::Insufficient { available }, Locale::En) => {
            format!("Only {available} units of {product_name} are left, so I couldn't add that many.")
        }
        (_, Locale::Es) => format!("Lo siento, {product_name} está agotado por ahora."),
        (_, Locale::En) => format!("Sorry, {product_name} is sold out right now."),
    }
}

/// Notice for a draft line cut back to what is left at confirmation time.
pub fn stock_adjusted(product_name: &str, available: u32, locale: Locale) -> String {
    match locale {
        Locale::Es => {
            format!("Solo quedan {available} unidades de {product_name}, ajusté tu pedido.")
        }
        Locale::En => {
            format!("Only {available} units of {product_name} are left, I adjusted your order.")
        }
    }
}

pub fn not_in_order(product_name: &str, locale: Locale) -> String {
    match locale {
        Locale::Es => format!("{product_name} no está en tu pedido."),
        Locale::En => format!("{product_name} is not in your order."),
    }
}

pub fn closed_notice(display_name: &str, hours_today: &str, locale: Locale) -> String {
    let closed_all_day = hours_today.trim().eq_ignore_ascii_case("closed");
    match (locale, closed_all_day) {
        (Locale::Es, true) => format!(
            "{display_name} está cerrado hoy, así que no puedo tomar pedidos. Con gusto respondo tus consultas."
        ),
        (Locale::Es, false) => format!(
            "En este momento {display_name} está cerrado. Horario de hoy: {hours_today}. Puedes hacer tu pedido cuando abramos."
        ),
        (Locale::En, true) => format!(
            "{display_name} is closed today, so I can't take orders. I'm happy to answer questions."
        ),
        (Locale::En, false) => format!(
            "{display_name} is closed right now. Today's hours: {hours_today}. You can order once we open."
        ),
    }
}

pub fn review_thanks(rating: Rating, locale: Locale) -> String {
    let stars = rating.value();
    match (stars, locale) {
        (4..=5, Locale::Es) => {
            format!("¡Muchas gracias por tu reseña de {stars} estrellas! Nos alegra que lo hayas disfrutado.")
        }
        (4..=5, Locale::En) => {
            format!("Thank you so much for the {stars}-star review! We're glad you enjoyed it.")
        }
        (3, Locale::Es) => {
            "Gracias por tu comentario. Lo tendremos en cuenta para mejorar.".to_owned()
        }
        (3, Locale::En) => "Thanks for the feedback. We'll use it to improve.".to_owned(),
        (_, Locale::Es) => {
            "Lamentamos que tu experiencia no haya sido buena. Tu comentario ya fue enviado al equipo."
                .to_owned()
        }
        (_, Locale::En) => {
            "We're sorry your experience wasn't good. Your feedback has been passed to the team."
                .to_owned()
        }
    }
}

pub fn complaint_apology(locale: Locale) -> String {
    match locale {
        Locale::Es => {
            "Lamentamos mucho lo ocurrido. Ya avisamos al equipo y te contactarán para resolverlo."
                .to_owned()
        }
        Locale::En => {
            "We're very sorry about this. The team has been notified and will follow up with you."
                .to_owned()
        }
    }
}

pub fn no_information(locale: Locale) -> String {
    match locale {
        Locale::Es => {
            "No tengo esa información a mano. Puedo ayudarte con el menú, un pedido u otra consulta."
                .to_owned()
        }
        Locale::En => {
            "I don't have that information at hand. I can help with the menu, an order or another question."
                .to_owned()
        }
    }
}

pub fn capabilities(display_name: &str, locale: Locale) -> String {
    match locale {
        Locale::Es => format!(
            "¡Hola! Soy el asistente de {display_name}. Puedo responder tus preguntas, mostrarte el menú, tomar tu pedido o registrar tu opinión."
        ),
        Locale::En => format!(
            "Hi! I'm the assistant for {display_name}. I can answer questions, show the menu, take your order or record your feedback."
        ),
    }
}
