use reqwest::Method;

use super::ApiClient;
use super::wire::DecisionRequest;
use crate::error::Error;
use crate::resources::{
    Approval, ApprovalDecision, ApprovalId, Iou, IouId, NewIou, NewProof, ProofOfExpense,
    Settlement,
};
use crate::storage::KeyValueStore;

impl<S: KeyValueStore> ApiClient<S> {
    /// # Errors
    ///
    /// See [`ApiClient::execute`].
    pub async fn list_ious(&self) -> Result<Vec<Iou>, Error> {
        self.get("/ious").await
    }

    /// # Errors
    ///
    /// See [`ApiClient::execute`].
    pub async fn get_iou(&self, id: &IouId) -> Result<Iou, Error> {
        let url = self.config.resource_url(&["ious", id.0.as_str()])?;
        self.execute(Method::GET, url, None).await
    }

    /// Request a new expense advance.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::execute`].
    pub async fn create_iou(&self, iou: &NewIou) -> Result<Iou, Error> {
        self.post("/ious", iou).await
    }

    /// Proofs submitted against an IOU.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::execute`].
    pub async fn list_proofs(&self, iou: &IouId) -> Result<Vec<ProofOfExpense>, Error> {
        let url = self.config.resource_url(&["ious", iou.0.as_str(), "proofs"])?;
        self.execute(Method::GET, url, None).await
    }

    /// # Errors
    ///
    /// See [`ApiClient::execute`].
    pub async fn submit_proof(&self, proof: &NewProof) -> Result<ProofOfExpense, Error> {
        self.post("/proofs", proof).await
    }

    /// # Errors
    ///
    /// See [`ApiClient::execute`].
    pub async fn list_settlements(&self) -> Result<Vec<Settlement>, Error> {
        self.get("/settlements").await
    }

    /// # Errors
    ///
    /// See [`ApiClient::execute`].
    pub async fn get_settlement(&self, id: &str) -> Result<Settlement, Error> {
        let url = self.config.resource_url(&["settlements", id])?;
        self.execute(Method::GET, url, None).await
    }

    /// Items waiting for the current user's decision.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::execute`].
    pub async fn list_approvals(&self) -> Result<Vec<Approval>, Error> {
        self.get("/approvals").await
    }

    /// Approve or reject an item. Returns the updated approval.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::execute`].
    pub async fn decide_approval(
        &self,
        id: &ApprovalId,
        decision: &ApprovalDecision,
    ) -> Result<Approval, Error> {
        let url = self
            .config
            .resource_url(&["approvals", id.0.as_str(), decision.path_segment()])?;
        let body = serde_json::to_value(DecisionRequest {
            reason: decision.reason(),
        })
        .map_err(Error::Encode)?;
        self.execute(Method::POST, url, Some(body)).await
    }
}
