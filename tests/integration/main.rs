mod bet_lifecycle;
mod mock_oracle;
