use std::time::{Duration, Instant};
use rand::{seq::SliceRandom, thread_rng, Rng};
use reqwest::Client;
use hdrhistogram::Histogram;


/// Load test: `cargo run -p xtask -- [base_url] [model]`
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let base = args.next().unwrap_or_else(|| "http://127.0.0.1:8080".to_string());
    let model = args.next().unwrap_or_else(|| "llama-7b".to_string());
    let url = format!("{}/v1/completions", base.trim_end_matches('/'));
    let clients = 4usize; // concurrent
    let total = 40usize; // total requests
    let prompts = vec![
        "The capital of France is",
        "Q: What is two plus two?\nA:",
        "Write a haiku about the sea:",
        "def fibonacci(n):",
        "Once upon a time, in a small village,",
        "The three primary colors are",
    ];

    let client = Client::builder().pool_idle_timeout(Duration::from_secs(10)).build()?;
    let mut hist = Histogram::<u64>::new(3)?;
    let mut errors = 0usize;

    let start = Instant::now();
    let mut tasks = vec![];
    for _ in 0..clients {
        let client = client.clone();
        let url = url.clone();
        let model = model.clone();
        let prompts = prompts.clone();
        tasks.push(tokio::spawn(async move {
            let mut latencies = vec![];
            let mut errs = 0;
            for _ in 0..(total / clients) {
                let body = {
                    let mut rng = thread_rng();
                    let prompt = prompts.choose(&mut rng).unwrap();
                    // mix greedy single completions with sampled batches
                    if rng.gen_bool(0.5) {
                        serde_json::json!({"model": model, "prompt": prompt})
                    } else {
                        serde_json::json!({"model": model, "prompt": prompt, "n": rng.gen_range(2..=4), "temperature": 0.7})
                    }
                };
                let t0 = Instant::now();
                let res = client.post(&url).json(&body).send().await;
                let dur = t0.elapsed();
                match res {
                    Ok(r) if r.status().is_success() => { latencies.push(dur); }
                    _ => errs += 1,
                }
            }
            (latencies, errs)
        }));
    }

    for t in tasks { let (ls, e) = t.await?; for d in ls { hist.record(d.as_millis() as u64).ok(); } errors += e; }

    println!("model {} : ran {} reqs in {:?}", model, total, start.elapsed());
    println!("errors: {}", errors);
    println!("p50: {} ms", hist.value_at_quantile(0.50));
    println!("p95: {} ms", hist.value_at_quantile(0.95));
    println!("p99: {} ms", hist.value_at_quantile(0.99));
    Ok(())
}
