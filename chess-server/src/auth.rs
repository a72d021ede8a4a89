//! 用户与登录凭证管理

use std::collections::HashMap;

use protocol::{AuthData, UserData, AUTH_TOKEN_LEN, MAX_USERNAME_LEN};
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::{debug, info};

use crate::error::{ServiceError, ServiceResult};

/// 用户管理器
#[derive(Debug, Default)]
pub struct UserStore {
    /// 用户名 -> 用户信息
    users: HashMap<String, UserData>,
    /// 令牌 -> 凭证
    tokens: HashMap<String, AuthData>,
}

impl UserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 生成随机令牌
    fn generate_token() -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(AUTH_TOKEN_LEN)
            .map(char::from)
            .collect()
    }

    fn issue(&mut self, username: &str) -> AuthData {
        let auth = AuthData {
            username: username.to_string(),
            auth_token: Self::generate_token(),
        };
        self.tokens.insert(auth.auth_token.clone(), auth.clone());
        auth
    }

    /// 注册新用户并直接登录
    pub fn register(&mut self, user: UserData) -> ServiceResult<AuthData> {
        if user.username.trim().is_empty()
            || user.password.trim().is_empty()
            || user.email.trim().is_empty()
            || user.username.chars().count() > MAX_USERNAME_LEN
        {
            return Err(ServiceError::bad_request());
        }
        if self.users.contains_key(&user.username) {
            return Err(ServiceError::already_taken());
        }

        let username = user.username.clone();
        self.users.insert(username.clone(), user);
        info!(%username, "user registered");
        Ok(self.issue(&username))
    }

    /// 登录，每次登录签发新令牌
    pub fn login(&mut self, username: &str, password: &str) -> ServiceResult<AuthData> {
        if username.trim().is_empty() || password.trim().is_empty() {
            return Err(ServiceError::bad_request());
        }
        match self.users.get(username) {
            Some(user) if user.password == password => {}
            _ => return Err(ServiceError::unauthorized()),
        }

        debug!(%username, "user logged in");
        Ok(self.issue(username))
    }

    /// 注销令牌
    pub fn logout(&mut self, auth_token: &str) -> ServiceResult<()> {
        match self.tokens.remove(auth_token) {
            Some(auth) => {
                debug!(username = %auth.username, "user logged out");
                Ok(())
            }
            None => Err(ServiceError::unauthorized()),
        }
    }

    /// 校验令牌
    pub fn authenticate(&self, auth_token: &str) -> ServiceResult<AuthData> {
        if auth_token.trim().is_empty() {
            return Err(ServiceError::unauthorized());
        }
        self.tokens
            .get(auth_token)
            .cloned()
            .ok_or_else(ServiceError::unauthorized)
    }

    /// 清空所有用户和令牌
    pub fn clear(&mut self) {
        self.users.clear();
        self.tokens.clear();
    }

    /// 已注册用户数
    pub fn user_count(&self) -> usize {
        self.users.len()
    }
}
