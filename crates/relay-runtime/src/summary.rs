//! One-line human summaries of tool results.
//!
//! Emitted right after each `tool-result` so a UI has something readable to
//! show even when the model never follows up with text.

use serde_json::Value;

const FALLBACK_PREVIEW_CHARS: usize = 200;

pub fn summarize_tool_result(name: &str, result: &Value) -> String {
    known_tool_summary(name, result).unwrap_or_else(|| {
        let rendered = result.to_string();
        let preview: String = rendered.chars().take(FALLBACK_PREVIEW_CHARS).collect();
        format!("{name} result: {preview}")
    })
}

fn known_tool_summary(name: &str, result: &Value) -> Option<String> {
    match (name, result) {
        ("get_emails", Value::Array(emails)) => {
            if emails.is_empty() {
                return Some("No matching emails found.".to_owned());
            }
            let head = format!("Found {} {}", emails.len(), plural(emails.len(), "email", "emails"));
            let subjects = field_values(emails, "subject", 2);
            Some(if subjects.is_empty() {
                format!("{head}.")
            } else {
                format!("{head}. Subjects: {}.", subjects.join("; "))
            })
        }
        ("search_policies", Value::Array(policies)) => {
            if policies.is_empty() {
                return Some("No relevant policies found.".to_owned());
            }
            let noun = plural(policies.len(), "policy", "policies");
            let titles = field_values(policies, "title", 2);
            Some(if titles.is_empty() {
                format!("Matched {} {noun}.", policies.len())
            } else {
                format!("Matched {} {noun}: {}.", policies.len(), titles.join("; "))
            })
        }
        ("search_open_tickets", Value::Array(tickets)) => {
            if tickets.is_empty() {
                return Some("No open tickets matched.".to_owned());
            }
            let noun = plural(tickets.len(), "open ticket", "open tickets");
            let titles = field_values(tickets, "title", 2);
            Some(if titles.is_empty() {
                format!("Found {} {noun}.", tickets.len())
            } else {
                format!("Found {} {noun}: {}.", tickets.len(), titles.join("; "))
            })
        }
        ("send_email", Value::Object(mail)) => {
            let to = mail
                .get("to")
                .or_else(|| mail.get("to_addr"))
                .and_then(Value::as_str);
            let subject = mail.get("subject").and_then(Value::as_str);
            Some(match (to, subject) {
                (Some(to), Some(subject)) => {
                    format!("Sent email to {to} with subject '{subject}'.")
                }
                _ => "Email sent.".to_owned(),
            })
        }
        ("add_ticket_comment", Value::Null) => {
            Some("Could not add comment (ticket not found).".to_owned())
        }
        ("add_ticket_comment", Value::Array(comments)) => {
            Some(format!("Comment added. Total comments: {}.", comments.len()))
        }
        ("add_ticket_comment", _) => Some("Comment added.".to_owned()),
        ("write_document", Value::Object(doc)) => {
            let id = doc.get("id").filter(|id| !id.is_null());
            let title = doc.get("title").and_then(Value::as_str);
            Some(match (id, title) {
                (Some(id), Some(title)) => format!("Saved document {}: {title}.", scalar(id)),
                _ => "Document saved.".to_owned(),
            })
        }
        ("read_document" | "get_runbook_by_category", Value::Null) => {
            Some("No runbook found.".to_owned())
        }
        ("read_document" | "get_runbook_by_category", Value::Object(doc)) => {
            let title = doc.get("title").and_then(Value::as_str).unwrap_or("runbook");
            Some(format!("Opened {title}."))
        }
        ("get_weather", Value::Object(weather)) => {
            let city = weather.get("city").and_then(Value::as_str).unwrap_or_default();
            let parts: Vec<&str> = ["temperature", "condition"]
                .iter()
                .filter_map(|key| weather.get(*key).and_then(Value::as_str))
                .filter(|part| !part.is_empty())
                .collect();
            Some(if city.is_empty() || parts.is_empty() {
                "Weather retrieved.".to_owned()
            } else {
                format!("Weather in {city}: {}.", parts.join(", "))
            })
        }
        _ => None,
    }
}

fn field_values<'a>(items: &'a [Value], key: &str, limit: usize) -> Vec<&'a str> {
    items
        .iter()
        .filter_map(|item| item.get(key).and_then(Value::as_str))
        .filter(|value| !value.is_empty())
        .take(limit)
        .collect()
}

fn plural<'a>(count: usize, one: &'a str, many: &'a str) -> &'a str {
    if count == 1 { one } else { many }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::summarize_tool_result;
    use serde_json::json;

    #[test]
    fn emails_list_counts_and_previews_subjects() {
        let result = json!([
            {"subject": "Invoice"},
            {"subject": "Refund"},
            {"subject": "Hidden"}
        ]);
        assert_eq!(
            summarize_tool_result("get_emails", &result),
            "Found 3 emails. Subjects: Invoice; Refund."
        );
        assert_eq!(
            summarize_tool_result("get_emails", &json!([])),
            "No matching emails found."
        );
    }

    #[test]
    fn policies_use_singular_for_one_match() {
        assert_eq!(
            summarize_tool_result("search_policies", &json!([{"title": "Refunds"}])),
            "Matched 1 policy: Refunds."
        );
    }

    #[test]
    fn weather_reports_city_and_conditions() {
        let result = json!({"city": "Lisbon", "temperature": "22 °C", "condition": "Sunny"});
        assert_eq!(
            summarize_tool_result("get_weather", &result),
            "Weather in Lisbon: 22 °C, Sunny."
        );
    }

    #[test]
    fn documents_and_mail_name_their_targets() {
        assert_eq!(
            summarize_tool_result("write_document", &json!({"id": 7, "title": "Plan"})),
            "Saved document 7: Plan."
        );
        assert_eq!(
            summarize_tool_result(
                "send_email",
                &json!({"to": "ops@example.com", "subject": "Status"})
            ),
            "Sent email to ops@example.com with subject 'Status'."
        );
        assert_eq!(
            summarize_tool_result("get_runbook_by_category", &json!(null)),
            "No runbook found."
        );
    }

    #[test]
    fn unknown_tools_fall_back_to_truncated_json() {
        let long = "x".repeat(500);
        let summary = summarize_tool_result("custom", &json!({ "blob": long }));
        assert!(summary.starts_with("custom result: {\"blob\":\"xxx"));
        assert_eq!(summary.chars().count(), "custom result: ".len() + 200);
    }
}
