use fuzzy::{FuzzChannels, FuzzConfig, FuzzOptions, FuzzResult, Fuzzer};
use std::collections::HashMap;
use std::io::Write;
use tempfile::NamedTempFile;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Minimal HTTP server: `/admin.php` and `/login` exist, everything else is a 404.
async fn serve() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = vec![0u8; 8192];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let head = String::from_utf8_lossy(&buf[..n]).to_string();
                let path = head.split_whitespace().nth(1).unwrap_or("/").to_string();

                let response = match path.as_str() {
                    "/admin.php" => "HTTP/1.1 200 OK\r\nContent-Length: 12\r\nConnection: close\r\n\r\nadmin panel\n".to_string(),
                    "/login" => "HTTP/1.1 302 Found\r\nLocation: /\r\nConnection: close\r\n\r\n".to_string(),
                    _ => "HTTP/1.1 404 Not Found\r\nContent-Length: 9\r\nConnection: close\r\n\r\nnot found".to_string(),
                };
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{}", addr)
}

fn wordlist(lines: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    file
}

async fn collect(mut channels: FuzzChannels) -> HashMap<String, FuzzResult> {
    let mut results = HashMap::new();
    while let Some(result) = channels.results.recv().await {
        results.insert(result.payload.clone(), result);
    }
    // The result stream closes only after the finish signal was sent.
    assert!(channels.finished.try_recv().is_ok());
    results
}

#[tokio::test]
async fn discovers_paths_with_extensions() {
    let base = serve().await;
    let wl = wordlist(&["admin", "login", "missing"]);

    let config = FuzzConfig::from_options(FuzzOptions {
        url: format!("{}/FUZZ", base),
        wordlist: wl.path().to_path_buf(),
        extensions: ".php".to_string(),
        concurrency: 4,
        progress: false,
        ..FuzzOptions::default()
    })
    .unwrap();
    assert!(config.keyword_present);

    let results = collect(Fuzzer::new(config).unwrap().start().await.unwrap()).await;

    assert_eq!(results.len(), 1);
    let admin = &results["admin"];
    assert_eq!(admin.status_code, 200);
    assert_eq!(admin.content_length, 12);
    assert_eq!(admin.num_words, 2);
    assert_eq!(admin.num_lines, 1);
}

#[tokio::test]
async fn appends_payloads_and_keeps_redirects() {
    let base = serve().await;
    let wl = wordlist(&["/admin.php", "login", "missing"]);

    let config = FuzzConfig::from_options(FuzzOptions {
        url: format!("{}/", base),
        wordlist: wl.path().to_path_buf(),
        concurrency: 2,
        progress: false,
        show_404: true,
        hide_lengths: "9".to_string(),
        ..FuzzOptions::default()
    })
    .unwrap();
    assert!(!config.keyword_present);

    let results = collect(Fuzzer::new(config).unwrap().start().await.unwrap()).await;

    let mut payloads: Vec<&String> = results.keys().collect();
    payloads.sort();
    assert_eq!(payloads, vec!["admin.php", "login"]);

    let login = &results["login"];
    assert_eq!(login.status_code, 302);
    assert_eq!(login.content_length, 0);
}

#[tokio::test]
async fn unreachable_target_still_finishes() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let wl = wordlist(&["a", "b"]);
    let config = FuzzConfig::from_options(FuzzOptions {
        url: format!("http://{}", addr),
        wordlist: wl.path().to_path_buf(),
        concurrency: 2,
        timeout_ms: 1000,
        progress: false,
        ..FuzzOptions::default()
    })
    .unwrap();

    let fuzzer = Fuzzer::new(config).unwrap();
    let counters = fuzzer.counters();
    let results = collect(fuzzer.start().await.unwrap()).await;

    assert!(results.is_empty());
    // Two payloads, each tried once and retried three times.
    assert_eq!(counters.snapshot().num_done_requests, 8);
}
