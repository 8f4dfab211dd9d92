// region:    --- Imports
use auction_client::api::{HttpMarketplaceApi, MarketplaceApi};
use auction_client::auction::Auction;
use auction_client::auth::{StaticTokenProvider, TokenProvider};
use auction_client::config::ClientConfig;
use auction_client::countdown::{Clock, Countdown, SystemClock};
use auction_client::detail::{AuctionDetailSession, DetailState, DetailView};
use auction_client::feed::{FeedTransport, WsFeedTransport};
use auction_client::format::format_currency;
use auction_client::wishlist::{WishlistCard, WishlistService};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
// endregion: --- Imports

// region:    --- Main
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // logging 초기화
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .with_target(false)
        .init();

    let config = ClientConfig::from_env()?;
    let api: Arc<dyn MarketplaceApi> = Arc::new(HttpMarketplaceApi::new(&config)?);
    let tokens: Arc<dyn TokenProvider> = Arc::new(StaticTokenProvider::new(config.token.clone()));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    match std::env::args().nth(1) {
        None => list_products(api.as_ref(), clock.as_ref()).await,
        Some(raw) => {
            let product_id: i64 = raw.parse()?;
            let transport: Arc<dyn FeedTransport> =
                Arc::new(WsFeedTransport::new(config.feed_url.clone()));
            watch_auction(&config, api, transport, tokens, clock, product_id).await
        }
    }
}
// endregion: --- Main

// region:    --- Commands
/// 상품 목록 출력
async fn list_products(
    api: &dyn MarketplaceApi,
    clock: &dyn Clock,
) -> Result<(), Box<dyn std::error::Error>> {
    let products = match api.list_products().await {
        Ok(products) => products,
        Err(e) => {
            error!("{:<12} --> 상품 목록 조회 실패: {}", "Main", e);
            return Err(e.into());
        }
    };

    let now = clock.now();
    for auction in products.iter().filter_map(Auction::from_document) {
        let time_left = auction
            .auction_end
            .map(|end| Countdown::new(end).snapshot(now).display)
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>6}  {:<40}  {:>14}  {}",
            auction.id,
            auction.name,
            format_currency(auction.highest_bid()),
            time_left
        );
    }
    Ok(())
}

/// 경매 상세 실시간 보기
/// stdin 명령: bid <금액>, quick <n>, dismiss, wish, open <id>, quit
async fn watch_auction(
    config: &ClientConfig,
    api: Arc<dyn MarketplaceApi>,
    transport: Arc<dyn FeedTransport>,
    tokens: Arc<dyn TokenProvider>,
    clock: Arc<dyn Clock>,
    product_id: i64,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = Arc::new(AuctionDetailSession::new(
        config,
        Arc::clone(&api),
        transport,
        Arc::clone(&tokens),
        clock,
    ));
    let wishlist = WishlistService::new(api, tokens);
    let mut card = WishlistCard::new(product_id);

    session.open(product_id).await?;
    card.refresh(&wishlist).await;
    info!("{:<12} --> 상세 보기 시작 id: {}", "Main", product_id);

    // 화면 갱신 작업
    let renderer = {
        let session = Arc::clone(&session);
        let mut changes = session.changes();
        tokio::spawn(async move {
            let mut last = String::new();
            loop {
                let rendered = render(&session.view());
                if rendered != last {
                    println!("{rendered}");
                    last = rendered;
                }
                if changes.changed().await.is_err() {
                    break;
                }
            }
        })
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some("bid"), Some(amount)) => {
                session.open_bid_modal();
                session.set_bid_input(amount);
                if let Err(e) = session.place_bid().await {
                    println!("! {}", e.user_message());
                }
            }
            (Some("quick"), Some(step)) => match step.parse::<usize>() {
                Ok(step) if step > 0 => {
                    if session.quick_bid(step - 1).is_none() {
                        println!("! Quick bid unavailable");
                    }
                }
                _ => println!("! quick <n> expects a step number from 1"),
            },
            (Some("dismiss"), _) => session.dismiss_bid_error(),
            (Some("wish"), _) => {
                card.toggle(&wishlist).await;
                if let Some(message) = card.message.take() {
                    println!("* {message}");
                }
            }
            (Some("open"), Some(id)) => match id.parse::<i64>() {
                Ok(id) => {
                    session.navigate(id).await?;
                    card = WishlistCard::new(id);
                    card.refresh(&wishlist).await;
                }
                Err(_) => println!("! open <id> expects a product id"),
            },
            (Some("quit"), _) => break,
            (None, _) => {}
            _ => println!("? bid <amount> | quick <n> | dismiss | wish | open <id> | quit"),
        }
    }

    session.close();
    renderer.abort();
    Ok(())
}
// endregion: --- Commands

// region:    --- Render
fn render(view: &DetailView) -> String {
    match &view.state {
        DetailState::Loading => return "Loading…".to_string(),
        DetailState::NotFound => return "Product not found".to_string(),
        DetailState::Failed(message) => return format!("! {message}"),
        DetailState::Loaded => {}
    }

    let mut out = vec![format!("== {} ==", view.title)];
    if let Some(banner) = &view.connection_banner {
        out.push(format!("[{banner}]"));
    }
    if let Some(bid) = &view.current_bid_display {
        out.push(format!("Current bid: {bid}"));
    }
    if let Some(pending) = &view.pending_bid {
        out.push(format!("Your bid: {pending}"));
    }
    if let Some(countdown) = &view.countdown {
        out.push(format!("Time left: {countdown}"));
    }
    if let Some(price) = &view.buy_now_display {
        out.push(format!("Buy now: {price}"));
    }
    if view.bidding_enabled {
        let quick = view
            .quick_bids
            .iter()
            .enumerate()
            .map(|(i, amount)| format!("{}) {}", i + 1, format_currency(*amount)))
            .collect::<Vec<_>>()
            .join("  ");
        if let Some(minimum) = &view.minimum_bid_display {
            out.push(format!("Minimum bid: {minimum}   Quick: {quick}"));
        }
    }
    if !view.bid_form.input.is_empty() {
        out.push(format!("Bid: {}", view.bid_form.input));
    }
    if let Some(error) = &view.bid_form.error {
        out.push(format!("! {error}"));
    }
    if let Some(notice) = &view.bid_form.notice {
        out.push(format!("* {notice}"));
    }
    for line in view.recent_bids.iter().take(5) {
        out.push(format!(
            "  {} {} {}",
            line.user_name,
            line.amount,
            line.at.as_deref().unwrap_or("")
        ));
    }
    out.join("\n")
}
// endregion: --- Render
