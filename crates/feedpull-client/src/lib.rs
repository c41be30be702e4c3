pub mod fetcher;
pub mod oauth;

pub use fetcher::ReqwestFetcher;
pub use oauth::OAuthTokenProvider;
