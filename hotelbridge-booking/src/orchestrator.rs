use chrono::{DateTime, Duration, NaiveDate, Utc};
use dashmap::DashSet;
use hotelbridge_catalog::PricingEngine;
use hotelbridge_core::guest::{validate_guests, ContactDetail, Guest};
use hotelbridge_core::identity::{resolve_agency, AgencyDirectory};
use hotelbridge_core::payment::{GatewayCallback, GatewayOrder, PaymentGateway, RedirectForm};
use hotelbridge_core::repository::TransactionRepository;
use hotelbridge_core::search::{HotelSearchCriteria, PriceBreakdown, PricedPackage};
use hotelbridge_core::supplier::{BookRequest, PolicyRequest, PolicyResponse, PrebookRequest, SupplierClient};
use hotelbridge_core::transaction::{NewTransaction, PaymentMethod, PaymentRecord};
use hotelbridge_core::{BookingError, BookingResult, MoneyDisposition, Principal, Transaction, TransactionStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::compensation::Compensator;
use crate::notify::NotificationDispatcher;
use crate::wallet::WalletAdapter;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyQuery {
    pub hotel_id: String,
    pub booking_key: String,
    pub search: HotelSearchCriteria,
}

/// Policy preview priced for the caller's agency. Creates no transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyQuote {
    pub policy: PolicyResponse,
    pub priced: PricedPackage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldRequest {
    pub hotel_id: String,
    pub booking_key: String,
    pub search: HotelSearchCriteria,
    pub guests: Vec<Guest>,
    pub contact: ContactDetail,
    /// Price the client displayed. A hold is refused if the price moved.
    #[serde(default)]
    pub expected_amount: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingOutcome {
    pub transaction_id: Uuid,
    pub status: TransactionStatus,
    pub confirmation_number: Option<String>,
    pub money: MoneyDisposition,
    pub amount: Decimal,
    pub currency: String,
    pub message: String,
}

impl BookingOutcome {
    fn from_transaction(txn: &Transaction) -> Self {
        let money = txn.money_disposition();
        let message = match txn.status {
            TransactionStatus::Confirmed => "Booking confirmed.".to_string(),
            _ => match &txn.failure_reason {
                Some(reason) => format!("{} {}", reason, money.describe()),
                None => money.describe().to_string(),
            },
        };

        Self {
            transaction_id: txn.id,
            status: txn.status,
            confirmation_number: txn.confirmation.as_ref().map(|c| c.confirmation_number.clone()),
            money,
            amount: txn.pricing.chargeable_rate,
            currency: txn.pricing.currency.clone(),
            message,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayRedirect {
    pub transaction_id: Uuid,
    pub form: RedirectForm,
}

/// Client-facing projection of a transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionView {
    pub id: Uuid,
    pub status: TransactionStatus,
    pub hotel_id: String,
    pub hotel_name: String,
    pub room_type: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub pricing: PriceBreakdown,
    pub hold_id: Option<String>,
    pub confirmation_number: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub money: MoneyDisposition,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl TransactionView {
    fn new(txn: &Transaction, session_ttl: Duration) -> Self {
        Self {
            id: txn.id,
            status: txn.status,
            hotel_id: txn.hotel_snapshot.hotel_id.clone(),
            hotel_name: txn.hotel_snapshot.name.clone(),
            room_type: txn.selected_package.room_type.clone(),
            check_in: txn.search_snapshot.check_in,
            check_out: txn.search_snapshot.check_out,
            pricing: txn.pricing.clone(),
            hold_id: txn.hold_id().map(str::to_string),
            confirmation_number: txn.confirmation.as_ref().map(|c| c.confirmation_number.clone()),
            payment_method: txn.payment.as_ref().map(|p| p.method),
            money: txn.money_disposition(),
            failure_reason: txn.failure_reason.clone(),
            created_at: txn.created_at,
            expires_at: txn.created_at + session_ttl,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub session_ttl: Duration,
    pub allow_duplicate_attempts: bool,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            session_ttl: Duration::minutes(hotelbridge_core::SESSION_TTL_MINUTES),
            allow_duplicate_attempts: false,
        }
    }
}

/// Collaborators the orchestrator drives.
pub struct OrchestratorDeps {
    pub supplier: Arc<dyn SupplierClient>,
    pub pricing: Arc<PricingEngine>,
    pub directory: Arc<dyn AgencyDirectory>,
    pub transactions: Arc<dyn TransactionRepository>,
    pub wallet: Arc<WalletAdapter>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub compensator: Compensator,
    pub notifications: NotificationDispatcher,
}

/// Held while one request advances a transaction; released on drop.
struct Claim {
    claims: Arc<DashSet<Uuid>>,
    id: Uuid,
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.claims.remove(&self.id);
    }
}

/// Drives a reservation from policy lookup to confirmed booking.
///
/// Every step loads the transaction, advances it and writes it back with a
/// compare-and-set on the prior status. Any failure after money is captured
/// is compensated before the error is returned.
pub struct BookingOrchestrator {
    supplier: Arc<dyn SupplierClient>,
    pricing: Arc<PricingEngine>,
    directory: Arc<dyn AgencyDirectory>,
    transactions: Arc<dyn TransactionRepository>,
    wallet: Arc<WalletAdapter>,
    gateway: Arc<dyn PaymentGateway>,
    compensator: Compensator,
    notifications: NotificationDispatcher,
    settings: OrchestratorSettings,
    claims: Arc<DashSet<Uuid>>,
}

impl BookingOrchestrator {
    pub fn new(deps: OrchestratorDeps, settings: OrchestratorSettings) -> Self {
        Self {
            supplier: deps.supplier,
            pricing: deps.pricing,
            directory: deps.directory,
            transactions: deps.transactions,
            wallet: deps.wallet,
            gateway: deps.gateway,
            compensator: deps.compensator,
            notifications: deps.notifications,
            settings,
            claims: Arc::new(DashSet::new()),
        }
    }

    pub fn session_ttl(&self) -> Duration {
        self.settings.session_ttl
    }

    fn claim(&self, id: Uuid) -> BookingResult<Claim> {
        if !self.claims.insert(id) {
            return Err(BookingError::Conflict(format!(
                "Transaction {} is already being processed",
                id
            )));
        }
        Ok(Claim { claims: self.claims.clone(), id })
    }

    /// Loads a transaction owned by the principal's agency. Anything else is
    /// reported as not found.
    async fn load_owned(&self, principal: &Principal, id: Uuid) -> BookingResult<Transaction> {
        let agency_id = resolve_agency(self.directory.as_ref(), principal).await?;
        match self.transactions.get(id).await? {
            Some(txn) if txn.agency_id == agency_id => Ok(txn),
            Some(_) => {
                warn!(target: "security", "Principal {} asked for transaction {} of another agency", principal.id, id);
                Err(not_found(id))
            }
            None => Err(not_found(id)),
        }
    }

    async fn save(&self, txn: &Transaction, expected: TransactionStatus) -> BookingResult<()> {
        self.transactions.save(txn, expected).await?;
        info!(transaction_id = %txn.id, "Transaction {} -> {}", expected, txn.status);
        Ok(())
    }

    /// Step 1: supplier policy for a package, priced for the caller.
    pub async fn fetch_policy(&self, principal: &Principal, query: &PolicyQuery) -> BookingResult<PolicyQuote> {
        query.search.validate()?;
        let agency_id = resolve_agency(self.directory.as_ref(), principal).await?;

        let policy = self
            .supplier
            .booking_policy(&PolicyRequest {
                booking_key: query.booking_key.clone(),
                hotel_id: query.hotel_id.clone(),
                search: query.search.clone(),
                transaction_id: Uuid::new_v4().to_string(),
            })
            .await?;
        let priced = self.pricing.apply_markup(&policy.package, agency_id).await?;

        Ok(PolicyQuote { policy, priced })
    }

    /// Step 2: opens a transaction, locks the policy and places a supplier hold.
    pub async fn create_hold(&self, principal: &Principal, request: HoldRequest) -> BookingResult<TransactionView> {
        request.search.validate()?;
        validate_guests(&request.guests, request.search.rooms.len())?;
        request.contact.validate()?;
        let agency_id = resolve_agency(self.directory.as_ref(), principal).await?;

        let policy = self
            .supplier
            .booking_policy(&PolicyRequest {
                booking_key: request.booking_key.clone(),
                hotel_id: request.hotel_id.clone(),
                search: request.search.clone(),
                transaction_id: Uuid::new_v4().to_string(),
            })
            .await?;
        let Some(policy_id) = policy.policy_id.clone() else {
            return Err(BookingError::supplier_rejected("bookingpolicy", "no policy id was issued for the package"));
        };

        let priced = self.pricing.apply_markup(&policy.package, agency_id).await?;
        if let Some(expected) = request.expected_amount {
            if expected != priced.pricing.chargeable_rate {
                return Err(BookingError::ValidationError(format!(
                    "Price changed from {} to {}",
                    expected, priced.pricing.chargeable_rate
                )));
            }
        }

        let mut txn = Transaction::new(NewTransaction {
            owner_type: principal.kind,
            owner_id: principal.id,
            agency_id,
            search_snapshot: request.search,
            hotel_snapshot: policy.hotel,
            selected_package: priced.package,
            pricing: priced.pricing,
            contact: request.contact,
            guests: request.guests,
        });

        let dedup_since = (!self.settings.allow_duplicate_attempts).then(|| Utc::now() - self.settings.session_ttl);
        self.transactions.insert(&txn, dedup_since).await?;
        info!(transaction_id = %txn.id, "Transaction created for agency {}", agency_id);

        txn.record_policy(policy_id.clone())?;
        txn.transition_to(TransactionStatus::PolicyFetched)?;
        self.save(&txn, TransactionStatus::Created).await?;

        let hold = self
            .supplier
            .prebook(&PrebookRequest {
                policy_id,
                guests: txn.guests.clone(),
                contact: txn.contact.clone(),
                transaction_id: txn.id.to_string(),
            })
            .await;

        match hold {
            Ok(hold) => {
                txn.record_hold(hold)?;
                txn.transition_to(TransactionStatus::Held)?;
                self.save(&txn, TransactionStatus::PolicyFetched).await?;
                Ok(TransactionView::new(&txn, self.settings.session_ttl))
            }
            Err(cause) => {
                warn!(transaction_id = %txn.id, "Prebook failed: {}", cause);
                txn.fail(TransactionStatus::BookingFailed, format!("Hold was not placed: {}", cause))?;
                self.save(&txn, TransactionStatus::PolicyFetched).await?;
                self.notifications.dispatch(&txn);
                Err(BookingError::failed(txn.id, MoneyDisposition::NotCharged, cause))
            }
        }
    }

    /// Steps 3 and 4 with the agency wallet.
    pub async fn pay_with_wallet(&self, principal: &Principal, id: Uuid) -> BookingResult<BookingOutcome> {
        let _claim = self.claim(id)?;
        let mut txn = self.load_owned(principal, id).await?;

        match txn.status {
            TransactionStatus::Held => {}
            TransactionStatus::PaymentConfirmed => return self.confirm_captured(txn).await,
            status if status.is_terminal() => return ended(&txn),
            status => return Err(invalid(status, TransactionStatus::PaymentConfirmed)),
        }
        txn.ensure_active(Utc::now(), self.settings.session_ttl)?;

        let amount = txn.pricing.chargeable_rate;
        let receipt = match self.wallet.debit(txn.agency_id, amount, &txn.id.to_string()).await {
            Ok(receipt) => receipt,
            Err(e) => {
                if let Some(shortfall) = e.shortfall() {
                    info!(transaction_id = %txn.id, "Wallet short by {} {}", shortfall, txn.pricing.currency);
                }
                return Err(e);
            }
        };

        txn.record_payment(PaymentRecord {
            method: PaymentMethod::Wallet,
            amount,
            currency: txn.pricing.currency.clone(),
            reference: receipt.entry_id.to_string(),
            captured_at: receipt.created_at,
        })?;
        txn.transition_to(TransactionStatus::PaymentConfirmed)?;
        if let Err(e) = self.save(&txn, TransactionStatus::Held).await {
            // The debit is keyed by transaction id, so a retry replays it instead of charging twice.
            error!(
                target: "critical",
                transaction_id = %txn.id,
                "Wallet debited {} but the payment could not be recorded: {}", amount, e
            );
            return Err(e);
        }

        self.confirm_captured(txn).await
    }

    /// Step 3 through the card/UPI gateway: returns the auto-submit form.
    pub async fn start_gateway_payment(&self, principal: &Principal, id: Uuid) -> BookingResult<GatewayRedirect> {
        let _claim = self.claim(id)?;
        let mut txn = self.load_owned(principal, id).await?;

        match txn.status {
            TransactionStatus::Held | TransactionStatus::PaymentPending => {}
            status if status.is_terminal() => {
                return Err(BookingError::failed(txn.id, txn.money_disposition(), already_ended(&txn)));
            }
            status => return Err(invalid(status, TransactionStatus::PaymentPending)),
        }
        txn.ensure_active(Utc::now(), self.settings.session_ttl)?;

        let form = self.gateway.initiate(&GatewayOrder::for_transaction(&txn)).await?;

        if txn.status == TransactionStatus::Held {
            txn.transition_to(TransactionStatus::PaymentPending)?;
            self.save(&txn, TransactionStatus::Held).await?;
        }

        Ok(GatewayRedirect { transaction_id: txn.id, form })
    }

    /// Signed gateway callback. The signature is the credential; no principal.
    pub async fn handle_gateway_callback(
        &self,
        raw_payload: &str,
        order_reference: &str,
        signature: &str,
    ) -> BookingResult<BookingOutcome> {
        let callback = self.gateway.verify_callback(raw_payload, signature).map_err(|e| {
            warn!(target: "security", "Rejected gateway callback for {}: {}", order_reference, e);
            e
        })?;
        if callback.reference != order_reference {
            warn!(
                target: "security",
                "Gateway callback reference {} does not match posted order {}",
                callback.reference, order_reference
            );
            return Err(BookingError::PaymentVerificationFailed("Order reference mismatch".to_string()));
        }
        let id = Uuid::parse_str(order_reference)
            .map_err(|_| BookingError::PaymentVerificationFailed(format!("Unknown order {}", order_reference)))?;

        let _claim = self.claim(id)?;
        let mut txn = self.transactions.get(id).await?.ok_or_else(|| not_found(id))?;

        if let Err(e) = callback.ensure_matches(&txn.id.to_string(), txn.pricing.chargeable_rate) {
            warn!(target: "security", transaction_id = %txn.id, "Tampered gateway callback: {}", e);
            return Err(e);
        }

        match txn.status {
            TransactionStatus::PaymentPending => {}
            TransactionStatus::PaymentConfirmed => return self.confirm_captured(txn).await,
            status if status.is_terminal() => return ended(&txn),
            status => return Err(invalid(status, TransactionStatus::PaymentConfirmed)),
        }

        if !callback.approved {
            txn.ensure_active(Utc::now(), self.settings.session_ttl).map_err(|e| {
                info!(transaction_id = %txn.id, "Ignoring gateway decline for an expired session");
                e
            })?;
            let reason = callback.status_message.clone().unwrap_or_else(|| "Payment was declined.".to_string());
            info!(transaction_id = %txn.id, "Gateway declined payment: {}", reason);
            txn.fail(TransactionStatus::PaymentFailed, reason)?;
            self.save(&txn, TransactionStatus::PaymentPending).await?;
            self.notifications.dispatch(&txn);
            return Ok(BookingOutcome::from_transaction(&txn));
        }

        txn.record_payment(gateway_payment(&txn, &callback))?;

        if txn.is_expired(Utc::now(), self.settings.session_ttl) {
            warn!(transaction_id = %txn.id, "Payment captured after the session expired, refunding");
            return self.compensate_and_fail(txn, BookingError::SessionExpired(id)).await;
        }

        txn.transition_to(TransactionStatus::PaymentConfirmed)?;
        if let Err(e) = self.save(&txn, TransactionStatus::PaymentPending).await {
            error!(
                target: "critical",
                transaction_id = %txn.id,
                "Gateway captured {} but the payment could not be recorded: {}", callback.amount, e
            );
            return Err(e);
        }

        self.confirm_captured(txn).await
    }

    /// Step 4. At most one supplier booking per transaction; repeated calls
    /// return the recorded result.
    pub async fn confirm_booking(&self, principal: &Principal, id: Uuid) -> BookingResult<BookingOutcome> {
        let _claim = self.claim(id)?;
        let txn = self.load_owned(principal, id).await?;

        match txn.status {
            TransactionStatus::PaymentConfirmed => self.confirm_captured(txn).await,
            status if status.is_terminal() => ended(&txn),
            status => {
                txn.ensure_active(Utc::now(), self.settings.session_ttl)?;
                Err(invalid(status, TransactionStatus::Confirmed))
            }
        }
    }

    pub async fn get_transaction(&self, principal: &Principal, id: Uuid) -> BookingResult<TransactionView> {
        let txn = self.load_owned(principal, id).await?;
        Ok(TransactionView::new(&txn, self.settings.session_ttl))
    }

    /// Books the held room for a transaction whose payment is captured.
    async fn confirm_captured(&self, mut txn: Transaction) -> BookingResult<BookingOutcome> {
        if txn.is_expired(Utc::now(), self.settings.session_ttl) {
            let id = txn.id;
            return self.compensate_and_fail(txn, BookingError::SessionExpired(id)).await;
        }
        let Some(hold_id) = txn.hold_id().map(str::to_string) else {
            return self
                .compensate_and_fail(txn, BookingError::Internal("Transaction has no supplier hold".to_string()))
                .await;
        };

        let confirmation = self
            .supplier
            .book(&BookRequest { hold_id, transaction_id: txn.id.to_string() })
            .await;

        match confirmation {
            Ok(confirmation) => {
                let number = confirmation.confirmation_number.clone();
                txn.record_confirmation(confirmation)?;
                txn.transition_to(TransactionStatus::Confirmed)?;
                if let Err(e) = self.save(&txn, TransactionStatus::PaymentConfirmed).await {
                    error!(
                        target: "critical",
                        transaction_id = %txn.id,
                        "Supplier confirmed {} but the booking could not be recorded: {}", number, e
                    );
                    return Err(e);
                }
                info!(transaction_id = %txn.id, "Booking confirmed: {}", number);
                self.notifications.dispatch(&txn);
                Ok(BookingOutcome::from_transaction(&txn))
            }
            Err(cause) => {
                warn!(transaction_id = %txn.id, "Supplier book failed: {}", cause);
                self.compensate_and_fail(txn, cause).await
            }
        }
    }

    /// Refunds the captured amount, moves to `booking_failed` and returns the
    /// failure with the resulting money disposition.
    ///
    /// The failure is stored before any money moves: a transaction that was
    /// refunded can never reach `book` again.
    async fn compensate_and_fail(&self, mut txn: Transaction, cause: BookingError) -> BookingResult<BookingOutcome> {
        let expected = txn.status;
        txn.fail(TransactionStatus::BookingFailed, format!("Booking failed: {}", cause))?;
        if let Err(e) = self.save(&txn, expected).await {
            error!(
                target: "critical",
                transaction_id = %txn.id,
                "Booking failed after capture ({}) but the failure could not be recorded, nothing refunded: {}", cause, e
            );
            return Err(e);
        }

        let record = self.compensator.refund(&txn, &cause.to_string()).await;
        let money = record.outcome;
        if let Err(e) = self.transactions.attach_compensation(txn.id, &record).await {
            error!(
                target: "critical",
                transaction_id = %txn.id,
                "Compensation ({:?}) could not be recorded: {}", money, e
            );
        }
        txn.record_compensation(record)?;
        self.notifications.dispatch(&txn);

        Err(BookingError::failed(txn.id, money, cause))
    }
}

fn gateway_payment(txn: &Transaction, callback: &GatewayCallback) -> PaymentRecord {
    PaymentRecord {
        method: PaymentMethod::Gateway,
        amount: callback.amount,
        currency: txn.pricing.currency.clone(),
        reference: callback.gateway_txn_id.clone().unwrap_or_else(|| callback.reference.clone()),
        captured_at: Utc::now(),
    }
}

fn not_found(id: Uuid) -> BookingError {
    BookingError::NotFound(format!("Transaction {}", id))
}

fn invalid(from: TransactionStatus, to: TransactionStatus) -> BookingError {
    BookingError::InvalidTransition { from: from.to_string(), to: to.to_string() }
}

fn already_ended(txn: &Transaction) -> BookingError {
    BookingError::Conflict(format!(
        "Transaction already ended as {}: {}",
        txn.status,
        txn.failure_reason.as_deref().unwrap_or("no reason recorded")
    ))
}

/// Replays the recorded result of a terminal transaction.
fn ended(txn: &Transaction) -> BookingResult<BookingOutcome> {
    match txn.status {
        TransactionStatus::Confirmed | TransactionStatus::PaymentFailed => Ok(BookingOutcome::from_transaction(txn)),
        _ => Err(BookingError::failed(txn.id, txn.money_disposition(), already_ended(txn))),
    }
}
