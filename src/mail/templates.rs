//! HTML email bodies. Every interpolated value coming from users or the
//! catalog goes through [`escape`].

use rust_decimal::Decimal;
use std::fmt::Write;

use crate::domain::aggregates::OrderStatus;
use crate::models::{ContactMessage, Order, OrderItem, SiteConfig, SupportTicket};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Store identity shown in every email.
#[derive(Debug, Clone)]
pub struct Brand {
    pub store_name: String,
    pub contact_email: Option<String>,
    pub currency: String,
}

impl From<&SiteConfig> for Brand {
    fn from(c: &SiteConfig) -> Self {
        Self { store_name: c.store_name.clone(), contact_email: c.contact_email.clone(), currency: c.currency.clone() }
    }
}

pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

fn money(amount: Decimal, currency: &str) -> String { format!("${:.2} {}", amount, currency) }

fn layout(brand: &Brand, title: &str, body: &str) -> String {
    let footer = match &brand.contact_email {
        Some(email) => format!("<p style=\"color:#888;font-size:12px\">¿Dudas? Escríbenos a {}</p>", escape(email)),
        None => String::new(),
    };
    format!(
        "<!DOCTYPE html><html><body style=\"font-family:Arial,sans-serif;color:#333\">\
         <div style=\"max-width:600px;margin:0 auto\">\
         <h1 style=\"color:#b5527a\">{store}</h1><h2>{title}</h2>{body}{footer}</div></body></html>",
        store = escape(&brand.store_name),
        title = escape(title),
    )
}

pub fn status_label(status: OrderStatus) -> &'static str {
    match status {
        OrderStatus::Pending => "Pendiente",
        OrderStatus::Confirmed => "Confirmado",
        OrderStatus::Preparing => "En preparación",
        OrderStatus::Shipped => "Enviado",
        OrderStatus::Delivered => "Entregado",
        OrderStatus::Cancelled => "Cancelado",
    }
}

pub fn welcome(brand: &Brand, full_name: &str) -> Rendered {
    let title = format!("¡Bienvenido(a), {full_name}!");
    let body = "<p>Tu cuenta fue creada. Ya puedes guardar favoritos, seguir tus pedidos y dejar reseñas.</p>";
    Rendered {
        subject: format!("Bienvenido(a) a {}", brand.store_name),
        html: layout(brand, &title, body),
        text: format!("{title}\nTu cuenta en {} fue creada.", brand.store_name),
    }
}

pub fn order_confirmation(brand: &Brand, order: &Order, items: &[OrderItem]) -> Rendered {
    let mut rows = String::new();
    let mut text = format!("Pedido {}\n", order.order_number);
    for item in items {
        let _ = write!(
            rows,
            "<tr><td>{}</td><td align=\"center\">{}</td><td align=\"right\">{}</td></tr>",
            escape(&item.product_name), item.quantity, money(item.total, &brand.currency)
        );
        let _ = writeln!(text, "{} x{} {}", item.product_name, item.quantity, money(item.total, &brand.currency));
    }
    let body = format!(
        "<p>Hola {name}, recibimos tu pedido <strong>{number}</strong>.</p>\
         <table width=\"100%\" cellpadding=\"4\"><tr><th align=\"left\">Producto</th><th>Cant.</th><th align=\"right\">Importe</th></tr>{rows}</table>\
         <p>Subtotal: {subtotal}<br>Envío: {shipping}<br><strong>Total: {total}</strong></p>",
        name = escape(&order.customer_name),
        number = escape(&order.order_number),
        subtotal = money(order.subtotal, &brand.currency),
        shipping = money(order.shipping_cost, &brand.currency),
        total = money(order.total, &brand.currency),
    );
    let _ = write!(text, "Total: {}", money(order.total, &brand.currency));
    Rendered {
        subject: format!("Confirmación de pedido {}", order.order_number),
        html: layout(brand, "Gracias por tu compra", &body),
        text,
    }
}

pub fn order_status_update(brand: &Brand, order: &Order, status: OrderStatus) -> Rendered {
    let label = status_label(status);
    let body = format!(
        "<p>Hola {}, tu pedido <strong>{}</strong> ahora está: <strong>{}</strong>.</p>",
        escape(&order.customer_name), escape(&order.order_number), label
    );
    Rendered {
        subject: format!("Tu pedido {} está {}", order.order_number, label.to_lowercase()),
        html: layout(brand, "Actualización de pedido", &body),
        text: format!("Tu pedido {} ahora está: {}", order.order_number, label),
    }
}

pub fn ticket_response(brand: &Brand, ticket: &SupportTicket, response: &str) -> Rendered {
    let body = format!(
        "<p>Hola {}, respondimos tu ticket <strong>{}</strong> ({}).</p>\
         <blockquote style=\"border-left:3px solid #b5527a;padding-left:8px\">{}</blockquote>",
        escape(&ticket.name), escape(&ticket.ticket_number), escape(&ticket.subject), escape(response).replace('\n', "<br>")
    );
    Rendered {
        subject: format!("Respuesta a tu ticket {}", ticket.ticket_number),
        html: layout(brand, "Soporte", &body),
        text: format!("Ticket {}\n\n{}", ticket.ticket_number, response),
    }
}

pub fn contact_acknowledgement(brand: &Brand, message: &ContactMessage) -> Rendered {
    let body = format!(
        "<p>Hola {}, recibimos tu mensaje \"{}\" y te responderemos pronto.</p>",
        escape(&message.name), escape(&message.subject)
    );
    Rendered {
        subject: format!("Recibimos tu mensaje - {}", brand.store_name),
        html: layout(brand, "Gracias por escribirnos", &body),
        text: format!("Recibimos tu mensaje \"{}\".", message.subject),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn brand() -> Brand {
        Brand { store_name: "Dulces Caseros".into(), contact_email: Some("hola@dulces.mx".into()), currency: "MXN".into() }
    }

    fn order() -> Order {
        Order {
            id: Uuid::nil(), order_number: "DC-20240101-ABC123".into(), user_id: None, customer_name: "<Ana>".into(),
            customer_email: "ana@example.com".into(), customer_phone: None, shipping_address: serde_json::json!({}),
            status: "pending".into(), payment_status: "pending".into(), payment_method: "card".into(),
            subtotal: Decimal::new(9100, 2), shipping_cost: Decimal::new(80, 0), total: Decimal::new(17100, 2),
            notes: None, created_at: Utc::now(), updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("<b>\"Tom & Jerry's\"</b>"), "&lt;b&gt;&quot;Tom &amp; Jerry&#39;s&quot;&lt;/b&gt;");
    }

    #[test]
    fn test_order_confirmation() {
        let items = vec![OrderItem {
            id: Uuid::nil(), order_id: Uuid::nil(), product_id: None, product_name: "Cocada <grande>".into(),
            unit_price: Decimal::new(4550, 2), quantity: 2, total: Decimal::new(9100, 2),
        }];
        let r = order_confirmation(&brand(), &order(), &items);
        assert_eq!(r.subject, "Confirmación de pedido DC-20240101-ABC123");
        assert!(r.html.contains("Cocada &lt;grande&gt;"));
        assert!(r.html.contains("Hola &lt;Ana&gt;"));
        assert!(r.html.contains("$171.00 MXN"));
        assert!(!r.html.contains("<Ana>"));
        assert!(r.text.contains("Total: $171.00 MXN"));
    }

    #[test]
    fn test_status_update() {
        let r = order_status_update(&brand(), &order(), OrderStatus::Shipped);
        assert_eq!(r.subject, "Tu pedido DC-20240101-ABC123 está enviado");
        assert!(r.html.contains("Enviado"));
        assert!(r.html.contains("hola@dulces.mx"));
    }

    #[test]
    fn test_welcome() {
        let r = welcome(&brand(), "Luis");
        assert_eq!(r.subject, "Bienvenido(a) a Dulces Caseros");
        assert!(r.html.contains("Luis"));
    }
}
