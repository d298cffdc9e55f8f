//! HTTP client bound to a [`SessionStore`].

use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::error::{ClientError, Result};
use crate::models::{
    ApiEnvelope, AuthPayload, Comment, CommentEnvelope, CommentPage, Credentials, ErrorBody,
    LikeCounter, NewComment, NewPost, PasswordChange, Post, PostEnvelope, PostPage, PostQuery,
    ProfileUpdate, RegisterRequest, SessionUser, TokenPayload, UserEnvelope,
};
use crate::router::{self, Navigation};
use crate::session::{NotificationKind, SessionStore};
use crate::storage::SessionStorage;

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000/api/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const SESSION_EXPIRED: &str = "登录已过期，请重新登录";
const NETWORK_ERROR: &str = "网络错误，请稍后重试";

pub struct ApiClient<S: SessionStorage> {
    http: Client,
    base_url: String,
    session: SessionStore<S>,
}

impl<S: SessionStorage> ApiClient<S> {
    /// Client for `base_url` (e.g. `http://host/api/v1`) over `session`.
    pub fn new(base_url: &str, session: SessionStore<S>) -> Result<Self> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn session(&self) -> &SessionStore<S> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionStore<S> {
        &mut self.session
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{}", self.base_url, path));
        match self.session.token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send and unwrap the success envelope.
    ///
    /// Any 401 ends the session before the error is returned.
    async fn execute<T: DeserializeOwned>(&mut self, builder: RequestBuilder) -> Result<ApiEnvelope<T>> {
        let response = builder.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            warn!("request rejected with 401, clearing session");
            self.session.clear_auth();
            self.session
                .add_notification(NotificationKind::Error, SESSION_EXPIRED, None);
        }

        if !status.is_success() {
            let body = response.json::<ErrorBody>().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                code: body.error,
                message: body.message,
            });
        }

        Ok(response.json::<ApiEnvelope<T>>().await?)
    }

    async fn fetch<T: DeserializeOwned>(&mut self, builder: RequestBuilder) -> Result<T> {
        self.execute(builder).await?.data.ok_or(ClientError::MissingData)
    }

    /// Run `result` through the loading flag and report failures as an
    /// error notification.
    fn finish<T>(&mut self, result: Result<T>, fallback: &str) -> Result<T> {
        self.session.set_loading(false);
        if let Err(e) = &result {
            let message = e.user_message(fallback);
            self.session
                .add_notification(NotificationKind::Error, message, None);
        }
        result
    }

    fn require_session(&self) -> Result<()> {
        if self.session.is_authenticated() {
            Ok(())
        } else {
            Err(ClientError::NotAuthenticated)
        }
    }

    // ============================================
    // Account
    // ============================================

    pub async fn register(&mut self, request: &RegisterRequest) -> Result<SessionUser> {
        self.session.set_loading(true);
        let builder = self.request(Method::POST, "/auth/register").json(request);
        let result = match self.fetch::<AuthPayload>(builder).await {
            Ok(payload) => self.start_session(payload),
            Err(e) => Err(e),
        };
        let user = self.finish(result, NETWORK_ERROR)?;

        info!(user_id = user.id, "registered");
        self.session
            .add_notification(NotificationKind::Success, "注册成功！欢迎加入MiniLove", None);
        Ok(user)
    }

    pub async fn login(&mut self, credentials: &Credentials) -> Result<SessionUser> {
        self.session.set_loading(true);
        let builder = self.request(Method::POST, "/auth/login").json(credentials);
        let result = match self.fetch::<AuthPayload>(builder).await {
            Ok(payload) => self.start_session(payload),
            Err(e) => Err(e),
        };
        let user = self.finish(result, NETWORK_ERROR)?;

        info!(user_id = user.id, "signed in");
        self.session.add_notification(
            NotificationKind::Success,
            format!("欢迎回来，{}！", user.username),
            None,
        );
        Ok(user)
    }

    fn start_session(&mut self, payload: AuthPayload) -> Result<SessionUser> {
        self.session.set_session(payload.token, payload.user.clone())?;
        Ok(payload.user)
    }

    /// Sign out. Server errors are ignored; the local session always ends.
    pub async fn logout(&mut self) {
        self.session.set_loading(true);
        let builder = self.request(Method::POST, "/auth/logout");
        if let Err(e) = self.execute::<serde_json::Value>(builder).await {
            debug!(error = %e, "logout request failed, clearing session anyway");
        }
        self.session.clear_auth();
        self.session
            .add_notification(NotificationKind::Info, "已成功退出登录", None);
        self.session.set_loading(false);
    }

    /// Reload the signed-in user from the server.
    pub async fn fetch_profile(&mut self) -> Result<SessionUser> {
        self.require_session()?;
        self.session.set_loading(true);

        let builder = self.request(Method::GET, "/auth/profile");
        let result = match self.fetch::<UserEnvelope<SessionUser>>(builder).await {
            Ok(envelope) => self
                .session
                .set_user(envelope.user.clone())
                .map(|_| envelope.user),
            Err(e) => Err(e),
        };
        self.finish(result, "获取用户信息失败")
    }

    pub async fn update_profile(&mut self, changes: &ProfileUpdate) -> Result<SessionUser> {
        self.require_session()?;
        self.session.set_loading(true);

        let builder = self.request(Method::PUT, "/auth/profile").json(changes);
        let result = match self.fetch::<UserEnvelope<SessionUser>>(builder).await {
            Ok(envelope) => self
                .session
                .set_user(envelope.user.clone())
                .map(|_| envelope.user),
            Err(e) => Err(e),
        };
        let user = self.finish(result, "更新失败，请稍后重试")?;

        self.session
            .add_notification(NotificationKind::Success, "个人信息更新成功", None);
        Ok(user)
    }

    pub async fn update_password(&mut self, change: &PasswordChange) -> Result<()> {
        self.require_session()?;
        self.session.set_loading(true);

        let builder = self.request(Method::PUT, "/auth/password").json(change);
        let result = self
            .execute::<serde_json::Value>(builder)
            .await
            .map(|_| ());
        self.finish(result, "密码更新失败，请稍后重试")?;

        self.session
            .add_notification(NotificationKind::Success, "密码更新成功", None);
        Ok(())
    }

    /// Ask the server whether the stored token is still valid. Any failure
    /// clears the session.
    pub async fn check_auth_status(&mut self) -> bool {
        if self.session.token().is_none() {
            return false;
        }

        self.session.set_loading(true);
        let builder = self.request(Method::GET, "/auth/verify");
        let valid = match self.execute::<serde_json::Value>(builder).await {
            Ok(envelope) => envelope.success,
            Err(e) => {
                debug!(error = %e, "token verification failed");
                self.session.clear_auth();
                false
            }
        };
        self.session.set_loading(false);
        valid
    }

    /// Exchange the current token for a fresh one.
    pub async fn refresh_token(&mut self) -> Result<()> {
        self.require_session()?;
        let builder = self.request(Method::POST, "/auth/refresh");
        let payload = self.fetch::<TokenPayload>(builder).await?;
        self.session.set_token(payload.token)
    }

    /// Run the navigation guard for `full_path`. When a token survived
    /// without its user the profile is reloaded first.
    pub async fn navigate(&mut self, full_path: &str) -> Navigation {
        let decision = router::before_each(full_path, &self.session);
        if decision != Navigation::Proceed {
            return decision;
        }

        if self.session.user().is_none() && self.session.token().is_some() {
            let builder = self.request(Method::GET, "/auth/profile");
            match self.fetch::<UserEnvelope<SessionUser>>(builder).await {
                Ok(envelope) => {
                    if let Err(e) = self.session.set_user(envelope.user) {
                        warn!(error = %e, "failed to persist reloaded user");
                    }
                }
                Err(e) => debug!(error = %e, "profile reload during navigation failed"),
            }
        }
        Navigation::Proceed
    }

    // ============================================
    // Posts & comments
    // ============================================

    pub async fn list_posts(&mut self, query: &PostQuery) -> Result<PostPage> {
        let builder = self.request(Method::GET, "/posts").query(query);
        self.fetch(builder).await
    }

    pub async fn trending_posts(&mut self, timeframe: &str) -> Result<Vec<Post>> {
        #[derive(serde::Deserialize)]
        struct Trending {
            posts: Vec<Post>,
        }

        let builder = self
            .request(Method::GET, "/posts/trending")
            .query(&[("timeframe", timeframe)]);
        Ok(self.fetch::<Trending>(builder).await?.posts)
    }

    pub async fn get_post(&mut self, id: i64) -> Result<Post> {
        let builder = self.request(Method::GET, &format!("/posts/{}", id));
        Ok(self.fetch::<PostEnvelope>(builder).await?.post)
    }

    pub async fn create_post(&mut self, post: &NewPost) -> Result<Post> {
        let builder = self.request(Method::POST, "/posts").json(post);
        Ok(self.fetch::<PostEnvelope>(builder).await?.post)
    }

    pub async fn delete_post(&mut self, id: i64) -> Result<()> {
        let builder = self.request(Method::DELETE, &format!("/posts/{}", id));
        self.execute::<serde_json::Value>(builder).await.map(|_| ())
    }

    /// Like a post, returning the new like count.
    pub async fn like_post(&mut self, id: i64) -> Result<i64> {
        let builder = self.request(Method::POST, &format!("/posts/{}/like", id));
        Ok(self.fetch::<LikeCounter>(builder).await?.likes_count)
    }

    pub async fn unlike_post(&mut self, id: i64) -> Result<i64> {
        let builder = self.request(Method::DELETE, &format!("/posts/{}/like", id));
        Ok(self.fetch::<LikeCounter>(builder).await?.likes_count)
    }

    pub async fn bookmark_post(&mut self, id: i64) -> Result<()> {
        let builder = self.request(Method::POST, &format!("/posts/{}/bookmark", id));
        self.execute::<serde_json::Value>(builder).await.map(|_| ())
    }

    pub async fn list_comments(&mut self, post_id: i64) -> Result<CommentPage> {
        let builder = self.request(Method::GET, &format!("/posts/{}/comments", post_id));
        self.fetch(builder).await
    }

    pub async fn create_comment(&mut self, comment: &NewComment) -> Result<Comment> {
        let builder = self.request(Method::POST, "/comments").json(comment);
        Ok(self.fetch::<CommentEnvelope>(builder).await?.comment)
    }
}
