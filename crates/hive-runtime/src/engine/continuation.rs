//! Continuation messages fed back to the model after post-processing.
//!
//! The closing hint depends on what the result bucket contains: real
//! failures outrank error reports, which outrank plain success.

use hive_core::delegation::DelegationResult;
use hive_core::tools::ToolResult;

const TOOL_HINT_SUCCESS: &str = "Review the tool results above and continue with your task. \
If the results complete the request, summarise the outcome for the user.";
const TOOL_HINT_FAILURE: &str = "Some tools failed. Review the errors above and adapt: \
correct the arguments, try a different approach, or explain what is blocking you.";
const TOOL_HINT_REPORT: &str = "You reported an error. Summarise what went wrong and what \
you need, so your manager can decide the next step.";

const DELEGATION_HINT_SUCCESS: &str = "All delegated tasks have completed. Synthesise the \
results above into a single coherent answer for the user.";
const DELEGATION_HINT_FAILURE: &str = "Some agents reported errors. Decide whether to \
retry, reassign, or adapt your plan accordingly.";

/// Render the `[TOOL RESULTS]` continuation.
#[must_use]
pub fn tool_results_message(results: &[ToolResult]) -> String {
    let mut message = String::from("[TOOL RESULTS]\n");

    for result in results {
        let args = result.args.join(", ");
        message.push_str(&format!("--- {}({args}) ---\n", result.tool));
        if result.success {
            let body = result.result.as_deref().unwrap_or("");
            if result.is_error_report {
                message.push_str(&format!("[ERROR REPORT] {body}\n"));
            } else {
                message.push_str(body);
                message.push('\n');
            }
            if result.truncated {
                message.push_str("(output truncated)\n");
            }
        } else {
            message.push_str(&format!(
                "Error: {}\n",
                result.error.as_deref().unwrap_or("unknown error")
            ));
        }
        message.push('\n');
    }

    let any_failure = results.iter().any(|r| !r.success);
    let any_report = results.iter().any(|r| r.is_error_report);
    message.push_str(if any_failure {
        TOOL_HINT_FAILURE
    } else if any_report {
        TOOL_HINT_REPORT
    } else {
        TOOL_HINT_SUCCESS
    });
    message
}

/// Render the `[DELEGATION RESULTS]` continuation.
#[must_use]
pub fn delegation_results_message(results: &[DelegationResult]) -> String {
    let mut message = String::from("[DELEGATION RESULTS]\n");

    for result in results {
        if let Some(error) = &result.error {
            message.push_str(&format!("--- Error from {} ---\n{error}\n\n", result.agent_name));
        } else {
            message.push_str(&format!(
                "--- Response from {} ---\n{}\n\n",
                result.agent_name,
                result.response.as_deref().unwrap_or("")
            ));
        }
    }

    let any_failure = results.iter().any(DelegationResult::is_err);
    message.push_str(if any_failure {
        DELEGATION_HINT_FAILURE
    } else {
        DELEGATION_HINT_SUCCESS
    });
    message
}
