use super::result::EventThread;

/// A recorded thread name usable for display, if any.
fn usable_name(name: &str) -> Option<&str> {
    let name = name.trim_end_matches('\0').trim();
    if name.is_empty() || is_tid_placeholder(name) {
        None
    } else {
        Some(name)
    }
}

/// `[tid=1234]` is emitted for threads the recorder could not name.
fn is_tid_placeholder(name: &str) -> bool {
    name.strip_prefix("[tid=")
        .and_then(|rest| rest.strip_suffix(']'))
        .map(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false)
}

pub fn clean_thread_name(name: &str, java_id: Option<i64>, os_id: Option<i64>) -> String {
    if let Some(name) = usable_name(name) {
        return name.to_string();
    }
    match (java_id, os_id) {
        (Some(java_id), _) => format!("Thread {}", java_id),
        (None, Some(os_id)) => format!("Native Thread {}", os_id),
        (None, None) => "Unknown Thread".to_string(),
    }
}

/// One-time cleanup pass over the merged threads.
pub fn clean_threads(threads: Vec<EventThread>) -> Vec<EventThread> {
    threads
        .into_iter()
        .map(|thread| EventThread {
            name: clean_thread_name(&thread.name, thread.java_id, thread.os_id),
            ..thread
        })
        .collect()
}
