//! 服务端错误类型

use protocol::{ChessError, ErrorCode, MoveRejection, ServerMessage};
use thiserror::Error;

/// 业务错误，携带返回给客户端的错误码
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Error: {message}")]
pub struct ServiceError {
    pub code: ErrorCode,
    pub message: String,
}

impl ServiceError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn bad_request() -> Self {
        Self::new(ErrorCode::BadRequest, "bad request")
    }

    pub fn unauthorized() -> Self {
        Self::new(ErrorCode::Unauthorized, "unauthorized")
    }

    pub fn already_taken() -> Self {
        Self::new(ErrorCode::AlreadyTaken, "already taken")
    }

    pub fn game_not_found() -> Self {
        Self::new(ErrorCode::GameNotFound, "game not found")
    }

    /// 转换为发给客户端的错误消息
    pub fn into_message(self) -> ServerMessage {
        ServerMessage::error(self.code, self.to_string())
    }
}

impl From<ChessError> for ServiceError {
    fn from(err: ChessError) -> Self {
        let code = match &err {
            ChessError::InvalidMove {
                reason: MoveRejection::NotYourTurn,
                ..
            } => ErrorCode::NotYourTurn,
            ChessError::InvalidMove { .. } => ErrorCode::InvalidMove,
            ChessError::GameOver => ErrorCode::GameOver,
        };
        Self::new(code, err.to_string())
    }
}

impl From<anyhow::Error> for ServiceError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(ErrorCode::InternalError, format!("{:#}", err))
    }
}

/// 业务操作结果类型
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::{Move, Position};

    #[test]
    fn test_chess_error_codes() {
        let mv = Move::new(Position::new(2, 1).unwrap(), Position::new(5, 1).unwrap());

        let err: ServiceError = ChessError::InvalidMove {
            mv,
            reason: MoveRejection::Illegal,
        }
        .into();
        assert_eq!(err.code, ErrorCode::InvalidMove);
        assert!(err.message.contains("(2,1):(5,1)"));

        let err: ServiceError = ChessError::InvalidMove {
            mv,
            reason: MoveRejection::NotYourTurn,
        }
        .into();
        assert_eq!(err.code, ErrorCode::NotYourTurn);

        let err: ServiceError = ChessError::GameOver.into();
        assert_eq!(err.code, ErrorCode::GameOver);
    }

    #[test]
    fn test_into_message() {
        let msg = ServiceError::unauthorized().into_message();
        assert_eq!(
            msg,
            ServerMessage::Error {
                code: ErrorCode::Unauthorized,
                message: "Error: unauthorized".to_string(),
            }
        );
    }

    #[test]
    fn test_from_anyhow() {
        let err: ServiceError = anyhow::anyhow!("disk full").into();
        assert_eq!(err.code, ErrorCode::InternalError);
        assert_eq!(err.message, "disk full");
    }
}
