use std::collections::HashMap;

use anyhow::{Context, Result, bail};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    GetWeather,
    SearchOpenTickets,
    SearchPolicies,
    GetEmails,
    SendEmail,
    WriteDocument,
    GetRunbookByCategory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// Lower-case words in a request that make the planner pick this tool.
    pub keywords: Vec<String>,
    pub kind: ToolKind,
}

impl ToolDefinition {
    fn new(name: &str, description: &str, keywords: &[&str], kind: ToolKind) -> Self {
        Self {
            name: name.to_owned(),
            description: description.to_owned(),
            keywords: keywords.iter().map(|k| (*k).to_owned()).collect(),
            kind,
        }
    }

    pub fn matches(&self, lowered_input: &str) -> bool {
        self.keywords.iter().any(|k| lowered_input.contains(k.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolDefinition>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn register(&mut self, definition: ToolDefinition) {
        if !self.tools.contains_key(&definition.name) {
            self.order.push(definition.name.clone());
        }
        self.tools.insert(definition.name.clone(), definition);
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name)
    }

    /// Definitions in registration order, which is also planning order.
    pub fn definitions(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.order.iter().filter_map(|name| self.tools.get(name))
    }

    pub fn with_demo_tools() -> Self {
        let mut registry = Self::default();
        registry.register(ToolDefinition::new(
            "get_weather",
            "Current conditions for a city",
            &["weather", "forecast", "temperature"],
            ToolKind::GetWeather,
        ));
        registry.register(ToolDefinition::new(
            "search_open_tickets",
            "Search open support tickets",
            &["ticket", "outage", "incident"],
            ToolKind::SearchOpenTickets,
        ));
        registry.register(ToolDefinition::new(
            "search_policies",
            "Search internal policies",
            &["policy", "policies", "compliance"],
            ToolKind::SearchPolicies,
        ));
        registry.register(ToolDefinition::new(
            "get_emails",
            "List recent inbox emails",
            &["inbox", "emails", "unread"],
            ToolKind::GetEmails,
        ));
        registry.register(ToolDefinition::new(
            "send_email",
            "Send an email",
            &["send", "notify"],
            ToolKind::SendEmail,
        ));
        registry.register(ToolDefinition::new(
            "write_document",
            "Save a document",
            &["write", "draft", "document", "report"],
            ToolKind::WriteDocument,
        ));
        registry.register(ToolDefinition::new(
            "get_runbook_by_category",
            "Fetch the runbook for an incident category",
            &["runbook", "playbook"],
            ToolKind::GetRunbookByCategory,
        ));
        registry
    }
}

#[derive(Debug, Default)]
struct MockState {
    sent: Vec<Value>,
    documents: Vec<Value>,
}

/// Executes tool calls against in-memory mock data.
///
/// Mutating tools (`send_email`, `write_document`) keep their effects for
/// the lifetime of the dispatcher.
#[derive(Debug)]
pub struct ToolDispatcher {
    registry: ToolRegistry,
    state: Mutex<MockState>,
}

impl ToolDispatcher {
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry,
            state: Mutex::new(MockState::default()),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Picks every tool whose keywords appear in `input`, in registry order.
    pub fn plan(&self, input: &str) -> Vec<ToolCall> {
        let lowered = input.to_lowercase();
        self.registry
            .definitions()
            .filter(|definition| definition.matches(&lowered))
            .map(|definition| ToolCall::new(&definition.name, arguments_for(definition.kind, input)))
            .collect()
    }

    #[instrument(skip(self, call), fields(tool = %call.name))]
    pub fn dispatch(&self, call: &ToolCall) -> Result<Value> {
        let definition = self
            .registry
            .get(&call.name)
            .with_context(|| format!("unknown tool: {}", call.name))?;
        debug!(arguments = %call.arguments, "dispatching mock tool");

        let args = &call.arguments;
        match definition.kind {
            ToolKind::GetWeather => Ok(weather(arg_str(args, "city").unwrap_or("San Francisco"))),
            ToolKind::SearchOpenTickets => Ok(search(&tickets(), arg_str(args, "query"))),
            ToolKind::SearchPolicies => Ok(search(&policies(), arg_str(args, "query"))),
            ToolKind::GetEmails => Ok(inbox()),
            ToolKind::SendEmail => {
                let to = arg_str(args, "to").context("send_email requires 'to'")?;
                if !to.contains('@') {
                    bail!("send_email: invalid recipient '{to}'");
                }
                let mail = json!({
                    "to": to,
                    "subject": arg_str(args, "subject").unwrap_or("(no subject)"),
                    "body": arg_str(args, "body").unwrap_or_default(),
                    "status": "sent",
                });
                self.state.lock().sent.push(mail.clone());
                Ok(mail)
            }
            ToolKind::WriteDocument => {
                let title = arg_str(args, "title").context("write_document requires 'title'")?;
                let mut state = self.state.lock();
                let doc = json!({
                    "id": state.documents.len() + 1,
                    "title": title,
                    "content": arg_str(args, "content").unwrap_or_default(),
                });
                state.documents.push(doc.clone());
                Ok(doc)
            }
            ToolKind::GetRunbookByCategory => {
                let category = arg_str(args, "category").unwrap_or("general");
                Ok(runbook(category))
            }
        }
    }

    pub fn sent_count(&self) -> usize {
        self.state.lock().sent.len()
    }
}

fn arg_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

fn arguments_for(kind: ToolKind, input: &str) -> Value {
    match kind {
        ToolKind::GetWeather => json!({ "city": city_in(input).unwrap_or("San Francisco") }),
        ToolKind::SearchOpenTickets | ToolKind::SearchPolicies => json!({ "query": input }),
        ToolKind::GetEmails => json!({ "limit": 3 }),
        ToolKind::SendEmail => json!({
            "to": "team@example.com",
            "subject": headline(input),
            "body": input,
        }),
        ToolKind::WriteDocument => json!({ "title": headline(input), "content": input }),
        ToolKind::GetRunbookByCategory => {
            let lowered = input.to_lowercase();
            let category = ["database", "network", "deploy"]
                .into_iter()
                .find(|category| lowered.contains(category))
                .unwrap_or("general");
            json!({ "category": category })
        }
    }
}

/// The capitalised word following "in", e.g. "weather in Paris".
fn city_in(input: &str) -> Option<&str> {
    let words: Vec<&str> = input.split_whitespace().collect();
    words.windows(2).find_map(|pair| {
        let candidate = pair[1].trim_matches(|c: char| !c.is_alphanumeric());
        let capitalised = candidate.chars().next().is_some_and(char::is_uppercase);
        (pair[0].eq_ignore_ascii_case("in") && capitalised).then_some(candidate)
    })
}

fn headline(input: &str) -> String {
    let words: Vec<&str> = input.split_whitespace().take(6).collect();
    if words.is_empty() {
        "Untitled".to_owned()
    } else {
        words.join(" ")
    }
}

fn weather(city: &str) -> Value {
    let seed: u32 = city.bytes().map(u32::from).sum();
    let conditions = ["sunny", "cloudy", "light rain", "windy"];
    json!({
        "city": city,
        "condition": conditions[(seed % 4) as usize],
        "temperature": format!("{}°C", 10 + seed % 18),
    })
}

fn search(records: &[Value], query: Option<&str>) -> Value {
    let terms: Vec<String> = query
        .unwrap_or_default()
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|term| term.len() > 3)
        .map(str::to_owned)
        .collect();
    let hits: Vec<Value> = records
        .iter()
        .filter(|record| {
            let haystack = record.to_string().to_lowercase();
            terms.iter().any(|term| haystack.contains(term.as_str()))
        })
        .cloned()
        .collect();
    Value::Array(if hits.is_empty() { records.to_vec() } else { hits })
}

fn tickets() -> Vec<Value> {
    vec![
        json!({ "id": "T-1042", "title": "Checkout latency above SLO", "category": "performance", "status": "open" }),
        json!({ "id": "T-1043", "title": "Database failover alert flapping", "category": "database", "status": "open" }),
        json!({ "id": "T-1047", "title": "VPN drops for remote staff", "category": "network", "status": "open" }),
    ]
}

fn policies() -> Vec<Value> {
    vec![
        json!({ "id": "P-7", "title": "Incident communication policy", "summary": "Notify stakeholders within 30 minutes of a sev-1." }),
        json!({ "id": "P-12", "title": "Data retention policy", "summary": "Customer logs are kept for 90 days." }),
        json!({ "id": "P-19", "title": "Remote access policy", "summary": "VPN is required for internal systems." }),
    ]
}

fn inbox() -> Value {
    json!([
        { "id": 1, "from": "oncall@example.com", "subject": "Failover drill tonight", "unread": true },
        { "id": 2, "from": "finance@example.com", "subject": "Q3 budget review", "unread": true },
        { "id": 3, "from": "hr@example.com", "subject": "Benefits enrollment reminder", "unread": false },
    ])
}

fn runbook(category: &str) -> Value {
    let steps: &[&str] = match category {
        "database" => &["Check replica lag", "Promote the healthy replica", "Repoint connection strings"],
        "network" => &["Check upstream provider status", "Fail traffic to the secondary region"],
        "deploy" => &["Halt the rollout", "Roll back to the previous release"],
        "general" => &["Acknowledge the page", "Open an incident channel", "Assign an incident lead"],
        _ => return Value::Null,
    };
    json!({
        "title": format!("{category} runbook"),
        "category": category,
        "steps": steps,
    })
}
