use crate::config::Config;
use crate::{auth::jwt::verify_token, model::role::Role, models::TokenType};
use actix_web::{
    FromRequest, HttpMessage, HttpRequest, dev::Payload, error::ErrorUnauthorized, web::Data,
};
use futures::future::{Ready, ready};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,

    /// Present only if this login is linked to a member record
    pub member_id: Option<u64>,
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // auth_middleware already verified the token for this request
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let token = match req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
        {
            Some(t) => t,
            None => return ready(Err(ErrorUnauthorized("Missing token"))),
        };

        let config = match req.app_data::<Data<Config>>() {
            Some(c) => c,
            None => {
                return ready(Err(actix_web::error::ErrorInternalServerError(
                    "Config missing",
                )));
            }
        };

        let claims = match verify_token(token, &config.jwt_secret) {
            Ok(c) if c.token_type == TokenType::Access => c,
            _ => return ready(Err(ErrorUnauthorized("Invalid token"))),
        };

        let role = match Role::from_id(claims.role) {
            Some(r) => r,
            None => return ready(Err(ErrorUnauthorized("Invalid role"))),
        };

        ready(Ok(AuthUser {
            user_id: claims.user_id,
            username: claims.sub,
            role,
            member_id: claims.member_id,
        }))
    }
}

impl AuthUser {
    pub fn require_admin(&self) -> actix_web::Result<()> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(actix_web::error::ErrorForbidden("Admin only"))
        }
    }

    pub fn require_leader_or_admin(&self) -> actix_web::Result<()> {
        if matches!(self.role, Role::Admin | Role::Leader) {
            Ok(())
        } else {
            Err(actix_web::error::ErrorForbidden("Leader/Admin only"))
        }
    }

    /// Admins may act on any cell; a leader only on the cell they lead.
    pub fn can_manage_cell(&self, cell_leader_member_id: Option<u64>) -> bool {
        match self.role {
            Role::Admin => true,
            Role::Leader => self.member_id.is_some() && self.member_id == cell_leader_member_id,
            Role::Member => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{generate_access_token, generate_refresh_token};
    use crate::config::tests::test_config;
    use actix_web::test::TestRequest;

    fn user(role: Role, member_id: Option<u64>) -> AuthUser {
        AuthUser {
            user_id: 1,
            username: "u".into(),
            role,
            member_id,
        }
    }

    #[test]
    fn leaders_manage_only_their_cell() {
        assert!(user(Role::Admin, None).can_manage_cell(None));
        assert!(user(Role::Leader, Some(4)).can_manage_cell(Some(4)));
        assert!(!user(Role::Leader, Some(4)).can_manage_cell(Some(5)));
        assert!(!user(Role::Leader, None).can_manage_cell(None));
        assert!(!user(Role::Member, Some(4)).can_manage_cell(Some(4)));
    }

    #[test]
    fn role_guards() {
        assert!(user(Role::Admin, None).require_admin().is_ok());
        assert!(user(Role::Leader, None).require_admin().is_err());
        assert!(user(Role::Leader, None).require_leader_or_admin().is_ok());
        assert!(user(Role::Member, None).require_leader_or_admin().is_err());
    }

    #[actix_web::test]
    async fn extractor_prefers_user_set_by_middleware() {
        let req = TestRequest::default().to_http_request();
        req.extensions_mut().insert(user(Role::Leader, Some(4)));

        let extracted = AuthUser::extract(&req).await.unwrap();
        assert_eq!(extracted.role, Role::Leader);
        assert_eq!(extracted.member_id, Some(4));
    }

    #[actix_web::test]
    async fn extractor_decodes_access_tokens_only() {
        let config = test_config();
        let access =
            generate_access_token(3, "esther".into(), 1, None, &config.jwt_secret, 60).unwrap();
        let (refresh, _) =
            generate_refresh_token(3, "esther".into(), 1, None, &config.jwt_secret, 60).unwrap();

        let req = TestRequest::default()
            .app_data(Data::new(config.clone()))
            .insert_header(("Authorization", format!("Bearer {access}")))
            .to_http_request();
        let extracted = AuthUser::extract(&req).await.unwrap();
        assert_eq!(extracted.username, "esther");
        assert_eq!(extracted.role, Role::Admin);

        let req = TestRequest::default()
            .app_data(Data::new(config))
            .insert_header(("Authorization", format!("Bearer {refresh}")))
            .to_http_request();
        assert!(AuthUser::extract(&req).await.is_err());
    }
}
