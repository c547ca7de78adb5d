use serde_json::json;

/// Exit codes: 0=success (2xx), 1=client error (4xx), 2=server error (5xx),
///             3=connection error, 4=usage error
pub const EXIT_USAGE: i32 = 4;
const EXIT_CONNECTION: i32 = 3;

pub fn client() -> reqwest::Client {
    reqwest::Client::new()
}

fn pretty(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

pub fn print_json(value: &serde_json::Value) {
    println!("{}", pretty(value));
}

pub fn exit_error(message: &str, docs_hint: Option<&str>) -> ! {
    let mut err = json!({
        "error": "cli_error",
        "message": message
    });
    if let Some(hint) = docs_hint {
        err["docs_hint"] = json!(hint);
    }
    eprintln!("{}", pretty(&err));
    std::process::exit(EXIT_USAGE);
}

pub fn exit_code_for(status: u16) -> i32 {
    match status {
        200..=299 => 0,
        400..=499 => 1,
        _ => 2,
    }
}

/// Send a request and return the status with the JSON body (no printing).
pub async fn send_json(
    api_url: &str,
    method: reqwest::Method,
    path: &str,
    query: &[(String, String)],
    body: Option<&serde_json::Value>,
) -> Result<(u16, serde_json::Value), String> {
    let mut req = client().request(method, format!("{api_url}{path}"));
    if !query.is_empty() {
        req = req.query(query);
    }
    if let Some(b) = body {
        req = req.json(b);
    }

    let resp = req.send().await.map_err(|e| format!("{e}"))?;
    let status = resp.status().as_u16();
    let body = resp
        .json()
        .await
        .unwrap_or_else(|e| json!({"raw_error": format!("Failed to parse response as JSON: {e}")}));
    Ok((status, body))
}

fn connection_error(message: String) -> i32 {
    eprintln!(
        "{}",
        pretty(&json!({
            "error": "connection_error",
            "message": message,
            "docs_hint": "Is the API server running? Check ASSURA_API_URL."
        }))
    );
    EXIT_CONNECTION
}

/// Execute an API request, print the response and return the exit code.
pub async fn api_request(
    api_url: &str,
    method: reqwest::Method,
    path: &str,
    query: &[(String, String)],
    body: Option<&serde_json::Value>,
) -> i32 {
    match send_json(api_url, method, path, query, body).await {
        Ok((status, resp_body)) => {
            let exit_code = exit_code_for(status);
            if exit_code == 0 {
                println!("{}", pretty(&resp_body));
            } else {
                eprintln!("{}", pretty(&resp_body));
            }
            exit_code
        }
        Err(message) => connection_error(message),
    }
}

/// Like [`api_request`], but returns the body on success so the caller can chain
/// a follow-up request. Errors are printed and turned into an exit code.
pub async fn api_request_value(
    api_url: &str,
    method: reqwest::Method,
    path: &str,
    body: Option<&serde_json::Value>,
) -> Result<serde_json::Value, i32> {
    match send_json(api_url, method, path, &[], body).await {
        Ok((status, resp_body)) if exit_code_for(status) == 0 => Ok(resp_body),
        Ok((status, resp_body)) => {
            eprintln!("{}", pretty(&resp_body));
            Err(exit_code_for(status))
        }
        Err(message) => Err(connection_error(message)),
    }
}
