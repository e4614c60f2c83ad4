use bytes::Bytes;
use chrono::Utc;
use metrics::counter;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::entities::payment_proof::{Model as ProofModel, VerificationStatus};
use crate::entities::purchase::PaymentStatus;
use crate::errors::ServiceError;
use crate::repositories::{PaymentProofStore, PurchaseStore};
use crate::storage::{ObjectStorage, PAYMENT_PROOFS_BUCKET};

/// Image submitted as proof of payment
#[derive(Debug, Clone)]
pub struct ProofUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl ProofUpload {
    /// Extension for the stored object, from the file name or the content type.
    fn extension(&self) -> String {
        let from_name = self
            .file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()));
        from_name.unwrap_or_else(|| {
            match self.content_type.as_str() {
                "image/png" => "png",
                "image/webp" => "webp",
                "image/gif" => "gif",
                _ => "jpg",
            }
            .to_string()
        })
    }
}

pub struct PaymentProofService {
    purchases: Arc<dyn PurchaseStore>,
    proofs: Arc<dyn PaymentProofStore>,
    storage: Arc<dyn ObjectStorage>,
    max_size_bytes: usize,
}

impl PaymentProofService {
    pub fn new(
        purchases: Arc<dyn PurchaseStore>,
        proofs: Arc<dyn PaymentProofStore>,
        storage: Arc<dyn ObjectStorage>,
        max_size_bytes: usize,
    ) -> Self {
        Self {
            purchases,
            proofs,
            storage,
            max_size_bytes,
        }
    }

    fn check_file(&self, upload: &ProofUpload) -> Result<(), ServiceError> {
        if upload.bytes.is_empty() {
            return Err(ServiceError::field("file", "File bukti pembayaran kosong"));
        }
        if upload.bytes.len() > self.max_size_bytes {
            return Err(ServiceError::field(
                "file",
                format!(
                    "Ukuran file maksimal {} MB",
                    self.max_size_bytes / (1024 * 1024)
                ),
            ));
        }
        if !upload.content_type.starts_with("image/") {
            return Err(ServiceError::field("file", "File harus berupa gambar"));
        }
        Ok(())
    }

    /// Stores the image, records the proof and marks the purchase `uploaded`.
    ///
    /// The steps are not transactional. The final transition only applies to a
    /// purchase that is still pending with no linked proof; when it touches no
    /// row (a concurrent upload won, or the purchase is gone) the proof row and
    /// the stored object are removed again.
    #[instrument(skip(self, user, upload), fields(user_id = %user.user_id, size = upload.bytes.len()))]
    pub async fn upload(
        &self,
        purchase_id: Uuid,
        user: &AuthUser,
        upload: ProofUpload,
    ) -> Result<ProofModel, ServiceError> {
        self.check_file(&upload)?;

        let purchase = self
            .purchases
            .find_by_id(purchase_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Pesanan {purchase_id} tidak ditemukan")))?;
        if !purchase.is_owned_by(user.user_id) {
            return Err(ServiceError::Forbidden(
                "Pesanan milik pengguna lain".to_string(),
            ));
        }
        if purchase.payment_status != PaymentStatus::Pending || purchase.payment_proof_id.is_some() {
            return Err(ServiceError::InvalidOperation(
                "Bukti pembayaran sudah diunggah".to_string(),
            ));
        }

        let now = Utc::now();
        let proof_id = Uuid::new_v4();
        let path = format!(
            "{}/{}/{}-{}.{}",
            user.user_id,
            purchase_id,
            now.timestamp_millis(),
            proof_id.simple(),
            upload.extension()
        );
        let image_url = self
            .storage
            .upload(PAYMENT_PROOFS_BUCKET, &path, upload.bytes)
            .await
            .map_err(|e| {
                error!(%purchase_id, error = %e, "proof upload to storage failed");
                e
            })?;

        let proof = ProofModel {
            id: proof_id,
            purchase_id,
            user_id: user.user_id,
            image_url,
            storage_path: path.clone(),
            verification_status: VerificationStatus::Pending,
            uploaded_at: now,
            verified_at: None,
            verified_by: None,
            notes: None,
        };
        let proof = match self.proofs.insert(proof).await {
            Ok(proof) => proof,
            Err(e) => {
                error!(%purchase_id, error = %e, "proof insert failed; removing stored object");
                self.discard(None, &path).await;
                return Err(e);
            }
        };

        match self.purchases.attach_proof_if_pending(purchase_id, proof.id).await {
            Ok(0) => {
                warn!(%purchase_id, proof_id = %proof.id, "purchase no longer accepts a proof; discarding");
                self.discard(Some(proof.id), &path).await;
                return Err(match self.purchases.find_by_id(purchase_id).await? {
                    Some(_) => ServiceError::Conflict(
                        "Bukti pembayaran sudah diunggah untuk pesanan ini".to_string(),
                    ),
                    None => ServiceError::NotFound(format!("Pesanan {purchase_id} tidak ditemukan")),
                });
            }
            Ok(_) => {}
            Err(e) => {
                error!(%purchase_id, proof_id = %proof.id, error = %e, "linking proof failed; discarding");
                self.discard(Some(proof.id), &path).await;
                return Err(e);
            }
        }

        counter!("kedai_payment_proofs_uploaded_total", 1);
        info!(%purchase_id, proof_id = %proof.id, "payment proof uploaded");
        Ok(proof)
    }

    /// Best-effort removal of a proof row and its stored object.
    async fn discard(&self, proof_id: Option<Uuid>, path: &str) {
        if let Some(proof_id) = proof_id {
            if let Err(e) = self.proofs.delete(proof_id).await {
                warn!(%proof_id, error = %e, "orphaned proof row left behind");
            }
        }
        if let Err(e) = self
            .storage
            .remove(PAYMENT_PROOFS_BUCKET, vec![path.to_string()])
            .await
        {
            warn!(%path, error = %e, "orphaned proof object left in storage");
        }
    }

    pub async fn list_for_purchase(
        &self,
        purchase_id: Uuid,
        user: &AuthUser,
    ) -> Result<Vec<ProofModel>, ServiceError> {
        let purchase = self
            .purchases
            .find_by_id(purchase_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Pesanan {purchase_id} tidak ditemukan")))?;
        if !purchase.is_owned_by(user.user_id) && !user.is_admin() {
            return Err(ServiceError::Forbidden(
                "Pesanan milik pengguna lain".to_string(),
            ));
        }
        self.proofs.list_for_purchase(purchase_id).await
    }

    /// Approval marks the purchase verified; rejection reopens it for a new upload.
    #[instrument(skip(self, notes))]
    pub async fn verify(
        &self,
        proof_id: Uuid,
        reviewer: Uuid,
        approved: bool,
        notes: Option<String>,
    ) -> Result<ProofModel, ServiceError> {
        let proof = self
            .proofs
            .find_by_id(proof_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Bukti {proof_id} tidak ditemukan")))?;
        if proof.verification_status != VerificationStatus::Pending {
            return Err(ServiceError::InvalidOperation(
                "Bukti pembayaran sudah diverifikasi".to_string(),
            ));
        }

        let (status, payment_status, linked) = if approved {
            (VerificationStatus::Approved, PaymentStatus::Verified, Some(proof.id))
        } else {
            (VerificationStatus::Rejected, PaymentStatus::Pending, None)
        };

        self.proofs
            .record_verification(proof_id, status, reviewer, notes, Utc::now())
            .await?;
        let rows = self
            .purchases
            .set_payment_state(proof.purchase_id, payment_status, linked)
            .await?;
        if rows == 0 {
            warn!(%proof_id, purchase_id = %proof.purchase_id, "verified proof has no purchase");
        }

        info!(%proof_id, %status, "payment proof reviewed");
        self.proofs
            .find_by_id(proof_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Bukti {proof_id} tidak ditemukan")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::{MockPaymentProofStore, MockPurchaseStore};
    use crate::services::test_fixtures::{purchase, user};
    use crate::storage::MockObjectStorage;
    use assert_matches::assert_matches;

    const MAX: usize = 5 * 1024 * 1024;

    fn png(len: usize) -> ProofUpload {
        ProofUpload {
            file_name: "bukti.PNG".into(),
            content_type: "image/png".into(),
            bytes: Bytes::from(vec![7u8; len]),
        }
    }

    fn storage_accepting() -> MockObjectStorage {
        let mut storage = MockObjectStorage::new();
        storage
            .expect_upload()
            .times(1)
            .returning(|bucket, path, _| Ok(format!("http://files/{bucket}/{path}")));
        storage
    }

    #[tokio::test]
    async fn valid_upload_links_one_proof_and_marks_uploaded() {
        let owner = Uuid::new_v4();
        let open = purchase(owner);
        let id = open.id;

        let mut purchases = MockPurchaseStore::new();
        purchases.expect_find_by_id().returning(move |_| Ok(Some(open.clone())));
        purchases
            .expect_attach_proof_if_pending()
            .withf(move |pid, _| *pid == id)
            .times(1)
            .returning(|_, _| Ok(1));

        let mut proofs = MockPaymentProofStore::new();
        proofs.expect_insert().times(1).returning(Ok);
        proofs.expect_delete().times(0);

        let service = PaymentProofService::new(
            Arc::new(purchases),
            Arc::new(proofs),
            Arc::new(storage_accepting()),
            MAX,
        );
        let proof = service.upload(id, &user(owner), png(1024)).await.unwrap();
        assert_eq!(proof.purchase_id, id);
        assert!(proof.storage_path.starts_with(&format!("{owner}/{id}/")));
        assert!(proof.storage_path.ends_with(".png"));
        assert_eq!(proof.verification_status, VerificationStatus::Pending);
    }

    #[tokio::test]
    async fn failed_insert_removes_uploaded_object() {
        let owner = Uuid::new_v4();
        let open = purchase(owner);
        let id = open.id;

        let mut purchases = MockPurchaseStore::new();
        purchases.expect_find_by_id().returning(move |_| Ok(Some(open.clone())));
        purchases.expect_attach_proof_if_pending().times(0);

        let mut proofs = MockPaymentProofStore::new();
        proofs
            .expect_insert()
            .times(1)
            .returning(|_| Err(ServiceError::ServiceUnavailable("db down".into())));

        let mut storage = storage_accepting();
        storage
            .expect_remove()
            .withf(|bucket, paths| bucket == PAYMENT_PROOFS_BUCKET && paths.len() == 1)
            .times(1)
            .returning(|_, _| Ok(()));

        let service =
            PaymentProofService::new(Arc::new(purchases), Arc::new(proofs), Arc::new(storage), MAX);
        assert_matches!(
            service.upload(id, &user(owner), png(10)).await,
            Err(ServiceError::ServiceUnavailable(_))
        );
    }

    #[tokio::test]
    async fn oversize_and_non_image_files_never_reach_storage() {
        let mut storage = MockObjectStorage::new();
        storage.expect_upload().times(0);
        let mut purchases = MockPurchaseStore::new();
        purchases.expect_find_by_id().times(0);

        let service = PaymentProofService::new(
            Arc::new(purchases),
            Arc::new(MockPaymentProofStore::new()),
            Arc::new(storage),
            MAX,
        );
        let owner = user(Uuid::new_v4());

        assert_matches!(
            service.upload(Uuid::new_v4(), &owner, png(MAX + 1)).await,
            Err(ServiceError::FieldValidation { ref field, .. }) if field == "file"
        );

        let mut pdf = png(10);
        pdf.content_type = "application/pdf".into();
        assert_matches!(
            service.upload(Uuid::new_v4(), &owner, pdf).await,
            Err(ServiceError::FieldValidation { .. })
        );
    }

    #[tokio::test]
    async fn already_uploaded_purchase_is_rejected() {
        let owner = Uuid::new_v4();
        let mut paid = purchase(owner);
        paid.payment_status = PaymentStatus::Uploaded;
        let id = paid.id;

        let mut purchases = MockPurchaseStore::new();
        purchases.expect_find_by_id().returning(move |_| Ok(Some(paid.clone())));
        let mut storage = MockObjectStorage::new();
        storage.expect_upload().times(0);

        let service = PaymentProofService::new(
            Arc::new(purchases),
            Arc::new(MockPaymentProofStore::new()),
            Arc::new(storage),
            MAX,
        );
        assert_matches!(
            service.upload(id, &user(owner), png(10)).await,
            Err(ServiceError::InvalidOperation(_))
        );
    }

    #[tokio::test]
    async fn losing_a_concurrent_upload_discards_row_and_object() {
        let owner = Uuid::new_v4();
        let open = purchase(owner);
        let id = open.id;

        let mut purchases = MockPurchaseStore::new();
        purchases.expect_find_by_id().returning(move |_| Ok(Some(open.clone())));
        purchases
            .expect_attach_proof_if_pending()
            .times(1)
            .returning(|_, _| Ok(0));

        let mut proofs = MockPaymentProofStore::new();
        proofs.expect_insert().times(1).returning(Ok);
        proofs.expect_delete().times(1).returning(|_| Ok(1));

        let mut storage = storage_accepting();
        storage
            .expect_remove()
            .withf(|bucket, paths| bucket == PAYMENT_PROOFS_BUCKET && paths.len() == 1)
            .times(1)
            .returning(|_, _| Ok(()));

        let service =
            PaymentProofService::new(Arc::new(purchases), Arc::new(proofs), Arc::new(storage), MAX);
        assert_matches!(
            service.upload(id, &user(owner), png(10)).await,
            Err(ServiceError::Conflict(_))
        );
    }

    fn pending_proof(purchase_id: Uuid) -> ProofModel {
        ProofModel {
            id: Uuid::new_v4(),
            purchase_id,
            user_id: Uuid::new_v4(),
            image_url: "http://files/x.png".into(),
            storage_path: "x.png".into(),
            verification_status: VerificationStatus::Pending,
            uploaded_at: Utc::now(),
            verified_at: None,
            verified_by: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn rejection_reopens_payment() {
        let purchase_id = Uuid::new_v4();
        let proof = pending_proof(purchase_id);
        let proof_id = proof.id;

        let mut proofs = MockPaymentProofStore::new();
        let mut seq = mockall::Sequence::new();
        let first = proof.clone();
        proofs
            .expect_find_by_id()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_| Ok(Some(first.clone())));
        proofs
            .expect_record_verification()
            .withf(|_, status, _, _, _| *status == VerificationStatus::Rejected)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _, _| Ok(1));
        let mut rejected = proof.clone();
        rejected.verification_status = VerificationStatus::Rejected;
        proofs
            .expect_find_by_id()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_| Ok(Some(rejected.clone())));

        let mut purchases = MockPurchaseStore::new();
        purchases
            .expect_set_payment_state()
            .withf(move |pid, status, linked| {
                *pid == purchase_id && *status == PaymentStatus::Pending && linked.is_none()
            })
            .times(1)
            .returning(|_, _, _| Ok(1));

        let service = PaymentProofService::new(
            Arc::new(purchases),
            Arc::new(proofs),
            Arc::new(MockObjectStorage::new()),
            MAX,
        );
        let reviewed = service
            .verify(proof_id, Uuid::new_v4(), false, Some("buram".into()))
            .await
            .unwrap();
        assert_eq!(reviewed.verification_status, VerificationStatus::Rejected);
    }

    #[test]
    fn extension_falls_back_to_content_type() {
        let mut upload = png(1);
        assert_eq!(upload.extension(), "png");
        upload.file_name = "bukti".into();
        upload.content_type = "image/webp".into();
        assert_eq!(upload.extension(), "webp");
    }
}
