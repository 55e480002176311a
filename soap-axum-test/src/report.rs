use std::future::Future;

pub struct CaseResult {
    pub name: &'static str,
    pub error: Option<String>,
}

/// Run one case and keep its outcome.
pub async fn case<F>(name: &'static str, run: F) -> CaseResult
where
    F: Future<Output = anyhow::Result<()>>,
{
    CaseResult {
        name,
        error: run.await.err().map(|e| format!("{e:#}")),
    }
}

/// Print every case; returns the number of passed and total cases.
pub fn print(label: &str, cases: &[CaseResult]) -> (usize, usize) {
    let mut passed = 0;
    for case in cases {
        match &case.error {
            None => {
                println!("  PASS  {label} / {}", case.name);
                passed += 1;
            }
            Some(e) => println!("  FAIL  {label} / {}: {e}", case.name),
        }
    }
    (passed, cases.len())
}
