pub async fn home() -> &'static str {
    "Payment Gateway Webhooks"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_home() {
        let response = home().await;
        assert_eq!(response, "Payment Gateway Webhooks");
    }
}
