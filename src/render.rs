//! Ticket rendering for committed events

use crate::db::Event;
use serde_json::{json, Value};
use std::sync::Arc;

/// Turns a committed event into a displayable platform message
pub trait NotificationRenderer: Send + Sync {
    fn render_ticket(&self, event: &Event) -> Value;
}

impl<T: NotificationRenderer + ?Sized> NotificationRenderer for Arc<T> {
    fn render_ticket(&self, event: &Event) -> Value {
        (**self).render_ticket(event)
    }
}

/// Renders a LINE flex message with one bubble per event
#[derive(Debug, Clone)]
pub struct FlexTicketRenderer {
    hero_image_url: Option<String>,
}

impl FlexTicketRenderer {
    pub fn new(hero_image_url: Option<String>) -> Self {
        Self { hero_image_url }
    }
}

fn detail_row(label: &str, value: &str) -> Value {
    json!({
        "type": "box",
        "layout": "baseline",
        "spacing": "sm",
        "contents": [
            { "type": "text", "text": label, "color": "#aaaaaa", "size": "sm", "flex": 1 },
            { "type": "text", "text": value, "wrap": true, "color": "#666666", "size": "sm", "flex": 3 }
        ]
    })
}

impl NotificationRenderer for FlexTicketRenderer {
    fn render_ticket(&self, event: &Event) -> Value {
        let lottery = if event.lottery { "Yes" } else { "No" };
        let members_max = event.members_max.to_string();

        let mut bubble = json!({
            "type": "bubble",
            "body": {
                "type": "box",
                "layout": "vertical",
                "contents": [
                    { "type": "text", "text": event.event_name, "weight": "bold", "size": "xl", "wrap": true },
                    {
                        "type": "box",
                        "layout": "vertical",
                        "margin": "lg",
                        "spacing": "sm",
                        "contents": [
                            detail_row("Date", &event.date),
                            detail_row("Deadline", &event.deadline),
                            detail_row("Location", &event.location),
                            detail_row("Capacity", &members_max),
                            detail_row("Lottery", lottery),
                            detail_row("Details", &event.description)
                        ]
                    }
                ]
            }
        });

        if let Some(url) = &self.hero_image_url {
            bubble["hero"] = json!({
                "type": "image",
                "url": url,
                "size": "full",
                "aspectRatio": "20:13",
                "aspectMode": "cover"
            });
        }

        json!({
            "type": "flex",
            "altText": format!("Event ticket: {}", event.event_name),
            "contents": bubble
        })
    }
}
