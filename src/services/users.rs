use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Deserialize;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{issue_token, AuthenticatedUser};
use crate::config::AppConfig;
use crate::entities::{
    otp_code, user, user_address, AddressType, OtpCode, User, UserAddress, UserAddressModel,
    UserModel, UserRole,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{10}$").unwrap());

/// Delivers one-time codes to a phone number.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send_otp(&self, phone: &str, code: &str) -> Result<(), ServiceError>;
}

/// Development sender that writes the code to the log instead of a gateway.
pub struct LoggingSms;

#[async_trait]
impl SmsSender for LoggingSms {
    async fn send_otp(&self, phone: &str, code: &str) -> Result<(), ServiceError> {
        info!(phone = %phone, code = %code, "OTP issued (logging sender)");
        Ok(())
    }
}

/// Posts the code to the configured SMS gateway.
pub struct HttpSms {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl HttpSms {
    pub fn from_config(config: &AppConfig) -> Option<Self> {
        let api_url = config.sms_api_url.clone()?;
        let api_key = config.sms_api_key.clone()?;
        Some(Self {
            client: reqwest::Client::new(),
            api_url,
            api_key,
        })
    }
}

#[async_trait]
impl SmsSender for HttpSms {
    async fn send_otp(&self, phone: &str, code: &str) -> Result<(), ServiceError> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "to": phone,
                "message": format!("Your verification code is {}", code),
            }))
            .send()
            .await
            .map_err(|e| {
                error!("SMS gateway request failed: {}", e);
                ServiceError::ExternalServiceError(format!("SMS gateway request failed: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(ServiceError::ExternalServiceError(format!(
                "SMS gateway returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct OtpRequest {
    pub phone: String,
    #[validate(length(min = 1, max = 100, message = "Full name must not be empty"))]
    pub fullname: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct OtpVerification {
    pub phone: String,
    #[validate(length(equal = 6, message = "Code must be 6 digits"))]
    pub code: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct ProfilePatch {
    #[validate(length(min = 1, max = 100, message = "Full name must not be empty"))]
    pub fullname: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    pub profile_photo: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct NewAddress {
    #[validate(length(min = 1, message = "Street is required"))]
    pub street: String,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "Landmark is required"))]
    pub land_mark: String,
    #[validate(length(min = 1, message = "State is required"))]
    pub state: String,
    #[validate(length(min = 1, message = "Country is required"))]
    pub country: String,
    #[validate(length(min = 1, message = "Zip code is required"))]
    pub zip_code: String,
    pub address_type: AddressType,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct AddressPatch {
    #[validate(length(min = 1, message = "Street must not be empty"))]
    pub street: Option<String>,
    #[validate(length(min = 1, message = "City must not be empty"))]
    pub city: Option<String>,
    #[validate(length(min = 1, message = "Landmark must not be empty"))]
    pub land_mark: Option<String>,
    #[validate(length(min = 1, message = "State must not be empty"))]
    pub state: Option<String>,
    #[validate(length(min = 1, message = "Country must not be empty"))]
    pub country: Option<String>,
    #[validate(length(min = 1, message = "Zip code must not be empty"))]
    pub zip_code: Option<String>,
    pub address_type: Option<AddressType>,
}

impl AddressPatch {
    pub fn is_empty(&self) -> bool {
        self.street.is_none()
            && self.city.is_none()
            && self.land_mark.is_none()
            && self.state.is_none()
            && self.country.is_none()
            && self.zip_code.is_none()
            && self.address_type.is_none()
    }
}

/// Phone-first accounts: signup and login are both OTP verification, and a
/// verified phone that has no account gets one created on the spot.
#[derive(Clone)]
pub struct UserService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    config: Arc<AppConfig>,
    sms: Arc<dyn SmsSender>,
}

fn generate_otp() -> String {
    let code: u32 = rand::thread_rng().gen_range(100_000..1_000_000);
    code.to_string()
}

impl UserService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        config: Arc<AppConfig>,
        sms: Arc<dyn SmsSender>,
    ) -> Self {
        Self {
            db,
            event_sender,
            config,
            sms,
        }
    }

    fn check_phone(phone: &str) -> Result<(), ServiceError> {
        if !PHONE_RE.is_match(phone) {
            return Err(ServiceError::ValidationError(
                "Phone number must be exactly 10 digits".to_string(),
            ));
        }
        Ok(())
    }

    /// Issues a fresh OTP for the phone, replacing any outstanding codes.
    #[instrument(skip(self, request), fields(phone = %request.phone))]
    pub async fn request_otp(&self, request: OtpRequest) -> Result<(), ServiceError> {
        Self::check_phone(&request.phone)?;

        if let Some(email) = &request.email {
            let taken = User::find()
                .filter(user::Column::Email.eq(email.clone()))
                .filter(user::Column::Phone.ne(request.phone.clone()))
                .one(self.db.as_ref())
                .await
                .map_err(ServiceError::DatabaseError)?;
            if taken.is_some() {
                return Err(ServiceError::Conflict(
                    "Email is already in use".to_string(),
                ));
            }
        }

        OtpCode::delete_many()
            .filter(otp_code::Column::Phone.eq(request.phone.clone()))
            .exec(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)?;

        let code = generate_otp();
        let expires_at =
            Utc::now() + Duration::minutes(self.config.otp_expiration_minutes as i64);

        let model = otp_code::ActiveModel {
            id: Set(Uuid::new_v4()),
            phone: Set(request.phone.clone()),
            code: Set(code.clone()),
            fullname: Set(request.fullname),
            email: Set(request.email),
            expires_at: Set(expires_at),
            created_at: Set(Utc::now()),
        };
        model
            .insert(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)?;

        self.sms.send_otp(&request.phone, &code).await?;

        self.event_sender
            .send_or_log(Event::OtpIssued {
                phone: request.phone,
                expires_at,
            })
            .await;

        Ok(())
    }

    /// Exchanges a valid OTP for a bearer token, creating the account on
    /// first login.
    #[instrument(skip(self, request), fields(phone = %request.phone))]
    pub async fn verify_otp(
        &self,
        request: OtpVerification,
    ) -> Result<(UserModel, String), ServiceError> {
        Self::check_phone(&request.phone)?;

        let row = OtpCode::find()
            .filter(otp_code::Column::Phone.eq(request.phone.clone()))
            .filter(otp_code::Column::Code.eq(request.code.clone()))
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)?;

        let row = match row {
            Some(row) if row.expires_at > Utc::now() => row,
            Some(stale) => {
                OtpCode::delete_by_id(stale.id)
                    .exec(self.db.as_ref())
                    .await
                    .map_err(ServiceError::DatabaseError)?;
                warn!(phone = %request.phone, "expired OTP presented");
                return Err(ServiceError::Unauthorized(
                    "OTP has expired, request a new one".to_string(),
                ));
            }
            None => {
                return Err(ServiceError::Unauthorized(
                    "Invalid verification code".to_string(),
                ))
            }
        };

        let existing = User::find()
            .filter(user::Column::Phone.eq(request.phone.clone()))
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)?;

        let (user, created) = match existing {
            Some(found) => {
                let mut active: user::ActiveModel = found.into();
                active.is_logged_in = Set(true);
                let updated = active
                    .update(self.db.as_ref())
                    .await
                    .map_err(ServiceError::DatabaseError)?;
                (updated, false)
            }
            None => {
                let model = user::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    fullname: Set(row.fullname.clone().unwrap_or_else(|| "User".to_string())),
                    email: Set(row.email.clone()),
                    phone: Set(request.phone.clone()),
                    role: Set(UserRole::User),
                    profile_photo: Set(None),
                    is_logged_in: Set(true),
                    order_count: Set(0),
                    ..Default::default()
                };
                let inserted = model
                    .insert(self.db.as_ref())
                    .await
                    .map_err(ServiceError::DatabaseError)?;
                (inserted, true)
            }
        };

        OtpCode::delete_by_id(row.id)
            .exec(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)?;

        let token = issue_token(&self.config, &user)?;

        if created {
            self.event_sender
                .send_or_log(Event::UserRegistered(user.id))
                .await;
        }
        self.event_sender
            .send_or_log(Event::UserLoggedIn(user.id))
            .await;

        Ok((user, token))
    }

    #[instrument(skip(self), fields(user_id = %principal.id))]
    pub async fn logout(&self, principal: &AuthenticatedUser) -> Result<(), ServiceError> {
        let user = self.get_profile(principal).await?;
        let mut active: user::ActiveModel = user.into();
        active.is_logged_in = Set(false);
        active
            .update(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)?;
        Ok(())
    }

    pub async fn get_profile(
        &self,
        principal: &AuthenticatedUser,
    ) -> Result<UserModel, ServiceError> {
        User::find_by_id(principal.id)
            .one(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))
    }

    #[instrument(skip(self, patch), fields(user_id = %principal.id))]
    pub async fn update_profile(
        &self,
        principal: &AuthenticatedUser,
        patch: ProfilePatch,
    ) -> Result<UserModel, ServiceError> {
        if patch.fullname.is_none() && patch.email.is_none() && patch.profile_photo.is_none() {
            return Err(ServiceError::InvalidInput(
                "At least one field must be provided".to_string(),
            ));
        }

        if let Some(email) = &patch.email {
            let taken = User::find()
                .filter(user::Column::Email.eq(email.clone()))
                .filter(user::Column::Id.ne(principal.id))
                .one(self.db.as_ref())
                .await
                .map_err(ServiceError::DatabaseError)?;
            if taken.is_some() {
                return Err(ServiceError::Conflict(
                    "Email is already in use".to_string(),
                ));
            }
        }

        let user = self.get_profile(principal).await?;
        let mut active: user::ActiveModel = user.into();
        if let Some(fullname) = patch.fullname {
            active.fullname = Set(fullname);
        }
        if let Some(email) = patch.email {
            active.email = Set(Some(email));
        }
        if let Some(photo) = patch.profile_photo {
            active.profile_photo = Set(Some(photo));
        }

        active
            .update(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    pub async fn list_addresses(
        &self,
        principal: &AuthenticatedUser,
    ) -> Result<Vec<UserAddressModel>, ServiceError> {
        UserAddress::find()
            .filter(user_address::Column::UserId.eq(principal.id))
            .order_by_desc(user_address::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Saves an address. The landmark doubles as the address's nickname and
    /// must be unique in the user's book, ignoring case.
    #[instrument(skip(self, input), fields(user_id = %principal.id))]
    pub async fn add_address(
        &self,
        principal: &AuthenticatedUser,
        input: NewAddress,
    ) -> Result<UserAddressModel, ServiceError> {
        let existing = self.list_addresses(principal).await?;
        if existing
            .iter()
            .any(|a| a.land_mark.eq_ignore_ascii_case(&input.land_mark))
        {
            return Err(ServiceError::Conflict(format!(
                "An address with landmark '{}' already exists",
                input.land_mark
            )));
        }

        let model = user_address::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(principal.id),
            street: Set(input.street),
            city: Set(input.city),
            land_mark: Set(input.land_mark),
            state: Set(input.state),
            country: Set(input.country),
            zip_code: Set(input.zip_code),
            address_type: Set(input.address_type),
            ..Default::default()
        };

        model
            .insert(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Partial update of one address; a changed landmark must stay unique
    /// among the user's other addresses.
    #[instrument(skip(self, patch), fields(user_id = %principal.id))]
    pub async fn update_address(
        &self,
        principal: &AuthenticatedUser,
        address_id: Uuid,
        patch: AddressPatch,
    ) -> Result<UserAddressModel, ServiceError> {
        if patch.is_empty() {
            return Err(ServiceError::InvalidInput(
                "At least one address field is required".to_string(),
            ));
        }

        let existing = self.list_addresses(principal).await?;
        let current = existing
            .iter()
            .find(|a| a.id == address_id)
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Address {} not found", address_id))
            })?
            .clone();

        if let Some(land_mark) = &patch.land_mark {
            if existing
                .iter()
                .any(|a| a.id != address_id && a.land_mark.eq_ignore_ascii_case(land_mark))
            {
                return Err(ServiceError::Conflict(format!(
                    "An address with landmark '{}' already exists",
                    land_mark
                )));
            }
        }

        let mut model: user_address::ActiveModel = current.into();
        if let Some(street) = patch.street {
            model.street = Set(street);
        }
        if let Some(city) = patch.city {
            model.city = Set(city);
        }
        if let Some(land_mark) = patch.land_mark {
            model.land_mark = Set(land_mark);
        }
        if let Some(state) = patch.state {
            model.state = Set(state);
        }
        if let Some(country) = patch.country {
            model.country = Set(country);
        }
        if let Some(zip_code) = patch.zip_code {
            model.zip_code = Set(zip_code);
        }
        if let Some(address_type) = patch.address_type {
            model.address_type = Set(address_type);
        }

        model
            .update(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)
    }

    #[instrument(skip(self), fields(user_id = %principal.id))]
    pub async fn delete_address(
        &self,
        principal: &AuthenticatedUser,
        address_id: Uuid,
    ) -> Result<(), ServiceError> {
        let result = UserAddress::delete_many()
            .filter(user_address::Column::Id.eq(address_id))
            .filter(user_address::Column::UserId.eq(principal.id))
            .exec(self.db.as_ref())
            .await
            .map_err(ServiceError::DatabaseError)?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Address {} not found",
                address_id
            )));
        }
        Ok(())
    }

    /// Admin listing of accounts, newest first.
    #[instrument(skip(self))]
    pub async fn list_users(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<UserModel>, u64), ServiceError> {
        let paginator = User::find()
            .order_by_desc(user::Column::CreatedAt)
            .paginate(self.db.as_ref(), per_page);

        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::DatabaseError)?;
        let users = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok((users, total))
    }
}
