use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::debug;
use serde::{Deserialize, Serialize};

use super::Embed;
use crate::error::{Error, Result};

/// 托管嵌入模型后端
///
/// 图片以 base64 编码经 HTTP 提交给嵌入服务。连接失败、超时与服务端 5xx
/// 都归类为 `BackendUnavailable`，与输入非法严格区分，调用方可以据此重试。
pub struct RemoteEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dim: usize,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    image: String,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

impl RemoteEmbedder {
    pub fn new(endpoint: String, model: String, dim: usize, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::BackendUnavailable(e.to_string()))?;
        Ok(Self { client, endpoint, model, dim })
    }
}

impl Embed for RemoteEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed(&self, image: &[u8]) -> Result<Vec<f32>> {
        let request = EmbedRequest { model: &self.model, image: STANDARD.encode(image) };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::BackendUnavailable(format!("{}: {e}", self.endpoint)))?;

        let status = response.status();
        if status.is_client_error() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::InputValidation(format!("嵌入服务拒绝请求 ({status}): {detail}")));
        }
        if !status.is_success() {
            return Err(Error::BackendUnavailable(format!("嵌入服务返回 {status}")));
        }

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::BackendUnavailable(format!("嵌入服务响应无法解析: {e}")))?;
        if body.embedding.len() != self.dim {
            return Err(Error::DimensionMismatch {
                expected: self.dim,
                actual: body.embedding.len(),
            });
        }
        debug!("远程嵌入完成，模型 {}，维度 {}", self.model, self.dim);
        Ok(body.embedding)
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    /// 起一个只应答一次的 HTTP 桩服务，读完请求后返回固定响应
    async fn stub_endpoint(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            // 读到头部结束并收完 content-length 声明的请求体
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let Ok(n) = socket.read(&mut chunk).await else {
                    return;
                };
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    let headers = String::from_utf8_lossy(&buf[..pos]).to_ascii_lowercase();
                    let content_length = headers
                        .lines()
                        .find_map(|line| line.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if buf.len() - pos - 4 >= content_length {
                        break;
                    }
                }
            }
            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\n\
                 content-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
        });
        format!("http://{addr}")
    }

    fn embedder(endpoint: String) -> RemoteEmbedder {
        RemoteEmbedder::new(endpoint, "arctic-embed-v2".to_string(), 4, 5).unwrap()
    }

    #[tokio::test]
    async fn wrong_length_response_is_dimension_mismatch() {
        let endpoint = stub_endpoint("200 OK", r#"{"embedding":[0.1,0.2]}"#).await;
        match embedder(endpoint).embed(b"image-bytes").await {
            Err(Error::DimensionMismatch { expected: 4, actual: 2 }) => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn server_error_is_backend_unavailable() {
        let endpoint = stub_endpoint("500 Internal Server Error", "boom").await;
        match embedder(endpoint).embed(b"image-bytes").await {
            Err(Error::BackendUnavailable(_)) => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn rejected_request_is_input_error() {
        let endpoint = stub_endpoint("422 Unprocessable Entity", "not an image").await;
        match embedder(endpoint).embed(b"image-bytes").await {
            Err(Error::InputValidation(_)) => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_backend_unavailable() {
        // 先拿到一个端口再关掉监听，保证没有服务在听
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        match embedder(format!("http://{addr}")).embed(b"image-bytes").await {
            Err(Error::BackendUnavailable(_)) => {}
            other => panic!("unexpected: {other:?}"),
        }
    }
}
