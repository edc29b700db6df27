// ============================================================================
// MODELS - MODULE PRINCIPAL
// ============================================================================
//
// Description:
//   Point d'entrée pour tous les modèles de données.
//   Chaque entité correspond à une table SQL gérée avec SeaORM.
//
// Liste des modules:
//   - health : Health check API
//   - users : Comptes (riders, drivers, staff, admin) + statut
//   - driver_details : Fiche véhicule / adresses d'un driver (1:1)
//   - bank_accounts : Coordonnées bancaires d'un driver (1:1)
//   - revoked_tokens : Blacklist des refresh tokens (logout)
//   - dto : Requêtes / réponses de l'API
//
// Points d'attention:
//   - Les jetons d'activation / reset ne sont PAS stockés : ils sont
//     recalculés à partir de l'état du compte (services::token_service)
//
// ============================================================================

pub mod health;
pub mod users;
pub mod driver_details;
pub mod bank_accounts;
pub mod revoked_tokens;
pub mod dto;
