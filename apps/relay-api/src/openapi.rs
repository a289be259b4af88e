use serde_json::{Value, json};

fn sse_response(description: &str) -> Value {
    json!({
        "200": {
            "description": description,
            "content": {
                "text/event-stream": {
                    "schema": { "type": "string" },
                },
            },
        },
        "400": { "$ref": "#/components/responses/BadRequest" },
    })
}

pub fn openapi_spec() -> Value {
    json!({
        "openapi": "3.1.0",
        "info": {
            "title": "Relay API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Real-time event relay for an agent runtime: per-request chat streams and a shared background task feed.",
        },
        "paths": {
            "/healthz": {
                "get": {
                    "summary": "Health check",
                    "responses": {
                        "200": {
                            "description": "Service health",
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "type": "object",
                                        "required": ["status", "service"],
                                        "properties": {
                                            "status": { "type": "string" },
                                            "service": { "type": "string" },
                                            "subscribers": { "type": "integer" },
                                            "tasks": { "type": "integer" },
                                        },
                                    },
                                },
                            },
                        },
                    },
                },
            },
            "/openapi.json": {
                "get": {
                    "summary": "OpenAPI document",
                    "responses": { "200": { "description": "This document" } },
                },
            },
            "/docs": {
                "get": {
                    "summary": "Interactive API reference",
                    "responses": { "200": { "description": "HTML page" } },
                },
            },
            "/": {
                "post": {
                    "summary": "Run one chat turn and stream its events",
                    "description": "One frame per agent event (`event: <kind>`), then a final `event: done` frame with empty data.",
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": { "$ref": "#/components/schemas/RunInput" },
                            },
                        },
                    },
                    "responses": sse_response("Chat event stream"),
                },
            },
            "/tasks": {
                "post": {
                    "summary": "Start a background task",
                    "requestBody": {
                        "required": true,
                        "content": {
                            "application/json": {
                                "schema": { "$ref": "#/components/schemas/RunInput" },
                            },
                        },
                    },
                    "responses": {
                        "200": {
                            "description": "Task accepted",
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "type": "object",
                                        "required": ["task_id"],
                                        "properties": { "task_id": { "type": "string" } },
                                    },
                                },
                            },
                        },
                        "400": { "$ref": "#/components/responses/BadRequest" },
                    },
                },
                "get": {
                    "summary": "List retained tasks, newest first",
                    "responses": {
                        "200": {
                            "description": "Task records",
                            "content": {
                                "application/json": {
                                    "schema": {
                                        "type": "array",
                                        "items": { "$ref": "#/components/schemas/TaskRecord" },
                                    },
                                },
                            },
                        },
                    },
                },
            },
            "/tasks/{task_id}": {
                "get": {
                    "summary": "Fetch one task",
                    "parameters": [
                        { "$ref": "#/components/parameters/TaskIdPath" },
                    ],
                    "responses": {
                        "200": {
                            "description": "Task record",
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/TaskRecord" },
                                },
                            },
                        },
                        "404": { "$ref": "#/components/responses/NotFound" },
                    },
                },
            },
            "/events": {
                "get": {
                    "summary": "Live task feed",
                    "description": "Named events `task.created` and `task.updated`. No replay: only notifications published after connecting are delivered.",
                    "parameters": [
                        {
                            "name": "task_id",
                            "in": "query",
                            "required": false,
                            "description": "Only deliver updates for this task. `task.created` always passes.",
                            "schema": { "type": "string" },
                        },
                    ],
                    "responses": sse_response("Task notification stream"),
                },
            },
        },
        "components": {
            "parameters": {
                "TaskIdPath": {
                    "name": "task_id",
                    "in": "path",
                    "required": true,
                    "schema": { "type": "string", "example": "t-1" },
                },
            },
            "responses": {
                "BadRequest": {
                    "description": "Malformed request",
                    "content": {
                        "application/json": {
                            "schema": { "$ref": "#/components/schemas/Error" },
                        },
                    },
                },
                "NotFound": {
                    "description": "Unknown or evicted task",
                    "content": {
                        "application/json": {
                            "schema": { "$ref": "#/components/schemas/Error" },
                        },
                    },
                },
            },
            "schemas": {
                "Error": {
                    "type": "object",
                    "required": ["error"],
                    "properties": { "error": { "type": "string" } },
                },
                "RunInput": {
                    "type": "object",
                    "required": ["items"],
                    "properties": {
                        "items": { "type": "string" },
                        "previousResponseId": { "type": "string" },
                        "conversationId": { "type": "string" },
                    },
                },
                "TaskStatus": {
                    "type": "string",
                    "enum": ["pending", "running", "done", "failed"],
                },
                "TaskRecord": {
                    "type": "object",
                    "required": ["task_id", "status", "input", "created_at", "updated_at"],
                    "properties": {
                        "task_id": { "type": "string" },
                        "status": { "$ref": "#/components/schemas/TaskStatus" },
                        "input": { "$ref": "#/components/schemas/RunInput" },
                        "created_at": { "type": "string", "format": "date-time" },
                        "updated_at": { "type": "string", "format": "date-time" },
                        "error": { "type": "string" },
                    },
                },
                "EventEnvelope": {
                    "type": "object",
                    "required": ["kind", "payload"],
                    "properties": {
                        "kind": { "type": "string", "example": "text-delta" },
                        "payload": { "type": "object" },
                    },
                },
                "TaskUpdated": {
                    "type": "object",
                    "required": ["task_id", "status"],
                    "properties": {
                        "task_id": { "type": "string" },
                        "status": { "$ref": "#/components/schemas/TaskStatus" },
                        "event": { "$ref": "#/components/schemas/EventEnvelope" },
                        "error": { "type": "string" },
                    },
                },
            },
        },
    })
}

pub fn scalar_docs_html(spec_url: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1" />
    <title>Relay API Docs</title>
    <style>
      html, body, #app {{
        margin: 0;
        padding: 0;
        height: 100%;
        width: 100%;
      }}
    </style>
  </head>
  <body>
    <div id="app"></div>
    <script src="https://cdn.jsdelivr.net/npm/@scalar/api-reference"></script>
    <script>
      Scalar.createApiReference('#app', {{
        url: '{spec_url}',
      }});
    </script>
  </body>
</html>
"#
    )
}
