use super::item::DisplayItem;
use super::payload::{Center, Event, FeedPayload};

/// Flattens a feed payload into display items.
///
/// Traversal is center → event group → event, and output order follows it.
/// Each event's description is its short description tagged with the
/// center (`"<short> @<name>, <city>"`); events lacking a title or a short
/// description are dropped. Never fails: absent fields default to empty.
pub fn normalize(payload: &FeedPayload) -> Vec<DisplayItem> {
    payload
        .centers
        .iter()
        .flat_map(|center| {
            center
                .groups()
                .iter()
                .flat_map(|group| group.events())
                .filter_map(move |event| to_item(center, event))
        })
        .collect()
}

fn to_item(center: &Center, event: &Event) -> Option<DisplayItem> {
    let title = event.title.as_deref().unwrap_or_default();
    let description = match event.short_description.as_deref() {
        Some(short) if !short.is_empty() => {
            format!("{short} @{}, {}", center.name(), center.city())
        }
        _ => String::new(),
    };
    let url = event.small_image_url.as_deref().unwrap_or_default();

    DisplayItem::new(title, description, url)
}
