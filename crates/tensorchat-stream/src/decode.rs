use tensorchat_core::{StreamEvent, TensorchatError, TensorchatResult};

/// Decodes one frame body into a [`StreamEvent`].
///
/// Returns `Ok(None)` for frames that carry no data (comments, keep-alives,
/// `event:`-only frames, `[DONE]` sentinels). A data frame whose payload is
/// not a valid event is a [`TensorchatError::Decode`]; the caller drops it
/// and keeps reading.
pub fn decode_frame(frame: &str) -> TensorchatResult<Option<StreamEvent>> {
    let mut data_lines: Vec<&str> = Vec::new();
    for raw_line in frame.split('\n') {
        let line = raw_line.trim_end_matches('\r');
        if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }
    if data_lines.is_empty() {
        return Ok(None);
    }

    let payload = data_lines.join("\n");
    let payload = payload.trim();
    if payload.is_empty() || payload == "[DONE]" {
        return Ok(None);
    }

    serde_json::from_str::<StreamEvent>(payload)
        .map(Some)
        .map_err(|e| TensorchatError::Decode(format!("{e} in frame '{}'", preview(payload))))
}

fn preview(payload: &str) -> &str {
    const MAX: usize = 120;
    if payload.len() <= MAX {
        return payload;
    }
    let mut end = MAX;
    while !payload.is_char_boundary(end) {
        end -= 1;
    }
    &payload[..end]
}
