//! Integration tests for the WebSocket transport.
//!
//! These spin up a real listener on a random port and talk to it with a
//! plain `tokio-tungstenite` client.

#[cfg(feature = "websocket")]
mod websocket {
    use std::sync::Arc;
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use playhub_transport::{Connection, Transport, WebSocketTransport};
    use tokio_tungstenite::tungstenite::Message;

    async fn connect_client(
        addr: &str,
    ) -> tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    > {
        let url = format!("ws://{addr}");
        let (ws, _) = tokio_tungstenite::connect_async(&url)
            .await
            .expect("client should connect");
        ws
    }

    async fn bind() -> (WebSocketTransport, String) {
        let transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("local addr").to_string();
        (transport, addr)
    }

    #[tokio::test]
    async fn test_websocket_accept_and_send_receive() {
        let (mut transport, addr) = bind().await;
        let server_handle = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });

        let mut client_ws = connect_client(&addr).await;
        let server_conn = server_handle.await.expect("task should complete");
        assert!(server_conn.id().into_inner() > 0);

        server_conn
            .send(b"hello from server")
            .await
            .expect("send should succeed");
        let msg = client_ws.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"hello from server");

        client_ws
            .send(Message::Binary(b"hello from client".to_vec().into()))
            .await
            .unwrap();
        let received = server_conn
            .recv()
            .await
            .expect("recv should succeed")
            .expect("should have data");
        assert_eq!(received, b"hello from client");

        server_conn.close().await.expect("close should succeed");
    }

    #[tokio::test]
    async fn test_websocket_text_frames_are_delivered_as_bytes() {
        let (mut transport, addr) = bind().await;
        let server_handle =
            tokio::spawn(async move { transport.accept().await.unwrap() });

        let mut client_ws = connect_client(&addr).await;
        let server_conn = server_handle.await.unwrap();

        client_ws
            .send(Message::Text(r#"{"action":"list_rooms"}"#.into()))
            .await
            .unwrap();
        let received = server_conn.recv().await.unwrap().unwrap();
        assert_eq!(received, br#"{"action":"list_rooms"}"#);
    }

    #[tokio::test]
    async fn test_websocket_send_not_blocked_by_pending_recv() {
        // A handler parked in recv() must still be able to push.
        let (mut transport, addr) = bind().await;
        let server_handle =
            tokio::spawn(async move { transport.accept().await.unwrap() });

        let mut client_ws = connect_client(&addr).await;
        let server_conn = Arc::new(server_handle.await.unwrap());

        let reader = Arc::clone(&server_conn);
        let _pending = tokio::spawn(async move { reader.recv().await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        tokio::time::timeout(
            Duration::from_secs(1),
            server_conn.send(b"push"),
        )
        .await
        .expect("send should not wait for recv")
        .expect("send should succeed");

        let msg = client_ws.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"push");
    }

    #[tokio::test]
    async fn test_websocket_recv_returns_none_on_client_close() {
        let (mut transport, addr) = bind().await;
        let server_handle = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });

        let mut client_ws = connect_client(&addr).await;
        let server_conn = server_handle.await.unwrap();

        client_ws.send(Message::Close(None)).await.unwrap();

        let result = server_conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on client close");
    }

    #[tokio::test]
    async fn test_websocket_send_utf8_goes_out_as_text_frame() {
        let (mut transport, addr) = bind().await;
        let server_handle =
            tokio::spawn(async move { transport.accept().await.unwrap() });

        let mut client_ws = connect_client(&addr).await;
        let server_conn = server_handle.await.unwrap();

        server_conn.send(br#"{"seq":1}"#).await.unwrap();
        server_conn.send(&[0xff, 0x00]).await.unwrap();

        let text = client_ws.next().await.unwrap().unwrap();
        assert!(matches!(text, Message::Text(ref t) if t.as_str() == r#"{"seq":1}"#));
        let binary = client_ws.next().await.unwrap().unwrap();
        assert!(binary.is_binary());
    }
}
