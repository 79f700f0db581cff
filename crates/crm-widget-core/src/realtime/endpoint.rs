//! Realtime endpoint URL construction.

use crm_widget_types::chat::ChatId;
use crm_widget_types::error::ConfigError;
use url::Url;

/// Build the realtime endpoint for a chat thread.
///
/// `{ws_base}/widget/ws?token=..&chatId=..[&visitorId=..]`, with every query
/// value URL-encoded.
pub fn realtime_url(
    ws_base: &str,
    token: &str,
    chat_id: &ChatId,
    visitor_id: Option<&str>,
) -> Result<String, ConfigError> {
    let raw = format!("{}/widget/ws", ws_base.trim_end_matches('/'));
    let mut url = Url::parse(&raw).map_err(|e| ConfigError::InvalidUrl {
        url: raw.clone(),
        reason: e.to_string(),
    })?;

    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("token", token)
            .append_pair("chatId", chat_id.as_str());
        if let Some(visitor_id) = visitor_id {
            query.append_pair("visitorId", visitor_id);
        }
    }

    Ok(url.to_string())
}
